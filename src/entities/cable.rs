//! Cabos

use crate::import::{FieldSpec, ImportSchema, Strength};

use super::references::{AREAS, DISCIPLINAS};

pub fn schema() -> ImportSchema {
    ImportSchema::new("cabos", "Cabos", "cabos")
        .field(
            FieldSpec::text("TAG", "tag")
                .required()
                .unique("Cabo já existe no sistema")
                .example("CB"),
        )
        .field(FieldSpec::text("TIPO DE CABO", "tipo_cabo").example("PP 3x2,5"))
        .field(
            FieldSpec::reference("DISCIPLINA", "disciplina_id", DISCIPLINAS, Strength::Hard)
                .required()
                .example("Elétrica"),
        )
        .field(FieldSpec::reference("ÁREA", "area_id", AREAS, Strength::Soft).example("Área 1"))
        .field(FieldSpec::text("ORIGEM", "origem").example("PN-01"))
        .field(FieldSpec::text("DESTINO", "destino").example("M-101"))
        .field(FieldSpec::number("SEÇÃO", "secao").example("2,5"))
        .field(FieldSpec::number("COMPRIMENTO", "comprimento").example("120"))
}
