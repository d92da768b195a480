//! Desenhos

use crate::import::{FieldSpec, ImportSchema, Strength};

use super::references::{AREAS, DESENHOS, DISCIPLINAS};

pub fn schema() -> ImportSchema {
    ImportSchema::new("desenhos", "Desenhos", DESENHOS.table)
        .field(
            FieldSpec::text("NUMERO", DESENHOS.key_column)
                .required()
                .unique("Desenho já existe no sistema")
                .example("DE-3010"),
        )
        .field(FieldSpec::text("TITULO", "titulo").required().example("Isométrico de tubulação"))
        .field(FieldSpec::text("REVISAO", "revisao").example("0"))
        .field(
            FieldSpec::reference("DISCIPLINA", "disciplina_id", DISCIPLINAS, Strength::Hard)
                .required()
                .example("Tubulação"),
        )
        .field(FieldSpec::reference("ÁREA", "area_id", AREAS, Strength::Soft).example("Área 1"))
}
