//! Juntas (piping welds)

use crate::import::{FieldSpec, ImportSchema, Strength};

use super::references::{DESENHOS, LINHAS};

pub fn schema() -> ImportSchema {
    ImportSchema::new("juntas", "Juntas", "juntas")
        .field(
            FieldSpec::text("NUMERO_JUNTA", "numero_junta")
                .required()
                .unique("Junta já existe no sistema")
                .example("J"),
        )
        .field(
            FieldSpec::reference("LINHA", "linha_id", LINHAS, Strength::Hard)
                .required()
                .example("L-1001"),
        )
        .field(FieldSpec::reference("DESENHO", "desenho_id", DESENHOS, Strength::Soft).example("DE-3010-001"))
        .field(FieldSpec::text("TIPO", "tipo").example("BW"))
        .field(FieldSpec::text("MATERIAL", "material").example("A106 Gr.B"))
        .field(FieldSpec::number("DIAMETRO", "diametro").example("4"))
        .field(FieldSpec::number("ESPESSURA", "espessura").example("6,02"))
}
