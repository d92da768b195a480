//! Luminárias

use crate::import::{FieldSpec, ImportSchema, Strength};

use super::references::AREAS;

pub fn schema() -> ImportSchema {
    ImportSchema::new("luminarias", "Luminárias", "luminarias")
        .field(
            FieldSpec::text("TAG", "tag")
                .required()
                .unique("Luminária já existe no sistema")
                .example("LM"),
        )
        .field(FieldSpec::text("TIPO", "tipo").example("LED"))
        .field(FieldSpec::text("DESCRICAO", "descricao").example("Luminária à prova de explosão"))
        .field(FieldSpec::reference("ÁREA", "area_id", AREAS, Strength::Soft).example("Área 1"))
        .field(FieldSpec::number("POTÊNCIA", "potencia").example("40"))
        .field(FieldSpec::number("QUANTIDADE", "quantidade").example("1"))
}
