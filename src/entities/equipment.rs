//! Equipamentos

use crate::import::{FieldSpec, ImportSchema, Strength};

use super::references::{AREAS, DISCIPLINAS};

pub fn schema() -> ImportSchema {
    ImportSchema::new("equipamentos", "Equipamentos", "equipamentos")
        .field(
            FieldSpec::text("TAG", "tag")
                .required()
                .unique("Equipamento já existe no sistema")
                .example("B"),
        )
        .field(FieldSpec::text("DESCRICAO", "descricao").example("Bomba centrífuga"))
        .field(
            FieldSpec::reference("DISCIPLINA", "disciplina_id", DISCIPLINAS, Strength::Hard)
                .required()
                .example("Mecânica"),
        )
        .field(FieldSpec::reference("ÁREA", "area_id", AREAS, Strength::Soft).example("Área 1"))
        .field(FieldSpec::number("POTÊNCIA", "potencia").example("15"))
}
