//! Válvulas

use crate::import::{FieldSpec, ImportSchema, Strength};

use super::references::{AREAS, FLUIDOS, LINHAS};

pub fn schema() -> ImportSchema {
    ImportSchema::new("valvulas", "Válvulas", "valvulas")
        .field(
            FieldSpec::text("TAG", "tag")
                .required()
                .unique("Válvula já existe no sistema")
                .example("XV"),
        )
        .field(
            FieldSpec::reference("LINHA", "linha_id", LINHAS, Strength::Hard)
                .required()
                .example("L-1001"),
        )
        .field(FieldSpec::reference("FLUIDO", "fluido_id", FLUIDOS, Strength::Soft).example("Água"))
        .field(FieldSpec::reference("ÁREA", "area_id", AREAS, Strength::Soft).example("Área 1"))
        .field(FieldSpec::text("TIPO", "tipo").example("Gaveta"))
        .field(FieldSpec::number("DN", "dn").example("2"))
}
