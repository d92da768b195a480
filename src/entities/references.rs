//! Reference tables consulted by the import modules

use crate::import::ReferenceDef;

pub const LINHAS: ReferenceDef = ReferenceDef {
    set: "linhas",
    table: "linhas",
    key_column: "nome",
    label: "Linha",
};

pub const FLUIDOS: ReferenceDef = ReferenceDef {
    set: "fluidos",
    table: "fluidos",
    key_column: "nome",
    label: "Fluido",
};

pub const DISCIPLINAS: ReferenceDef = ReferenceDef {
    set: "disciplinas",
    table: "disciplinas",
    key_column: "nome",
    label: "Disciplina",
};

pub const AREAS: ReferenceDef = ReferenceDef {
    set: "areas",
    table: "areas",
    key_column: "nome",
    label: "Área",
};

/// Drawings are both a reference set and an import module
pub const DESENHOS: ReferenceDef = ReferenceDef {
    set: "desenhos",
    table: "desenhos",
    key_column: "numero",
    label: "Desenho",
};

/// Lookup tables maintained by hand (`cadastro ref`)
pub const STANDALONE: [ReferenceDef; 4] = [LINHAS, FLUIDOS, DISCIPLINAS, AREAS];

/// Every reference set, standalone or backed by a module
pub const ALL: [ReferenceDef; 5] = [LINHAS, FLUIDOS, DISCIPLINAS, AREAS, DESENHOS];

/// Find a reference set by name (case-insensitive)
pub fn by_name(name: &str) -> Option<ReferenceDef> {
    ALL.iter().copied().find(|r| r.set.eq_ignore_ascii_case(name.trim()))
}

/// Whether the set is maintained through `cadastro ref`
pub fn is_standalone(def: &ReferenceDef) -> bool {
    STANDALONE.iter().any(|r| r.set == def.set)
}
