//! Import modules
//!
//! Each cadastre is a declarative [`ImportSchema`]:
//!
//! **Piping:**
//! - `juntas` - welds, keyed by `NUMERO_JUNTA`
//! - `valvulas` - valves, keyed by `TAG`
//!
//! **Electrical and general:**
//! - `cabos` - cables
//! - `equipamentos` - equipment
//! - `luminarias` - luminaires
//!
//! **Documents:**
//! - `desenhos` - drawings, also used as a reference set by `juntas`

pub mod cable;
pub mod drawing;
pub mod equipment;
pub mod joint;
pub mod luminaire;
pub mod references;
pub mod valve;

use std::fmt;
use std::str::FromStr;

use crate::core::backend::TableDef;
use crate::import::{ImportError, ImportSchema};

/// An importable cadastre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Juntas,
    Valvulas,
    Cabos,
    Desenhos,
    Equipamentos,
    Luminarias,
}

impl Module {
    pub const ALL: [Module; 6] = [
        Module::Juntas,
        Module::Valvulas,
        Module::Cabos,
        Module::Desenhos,
        Module::Equipamentos,
        Module::Luminarias,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Juntas => "juntas",
            Module::Valvulas => "valvulas",
            Module::Cabos => "cabos",
            Module::Desenhos => "desenhos",
            Module::Equipamentos => "equipamentos",
            Module::Luminarias => "luminarias",
        }
    }

    pub fn schema(&self) -> ImportSchema {
        match self {
            Module::Juntas => joint::schema(),
            Module::Valvulas => valve::schema(),
            Module::Cabos => cable::schema(),
            Module::Desenhos => drawing::schema(),
            Module::Equipamentos => equipment::schema(),
            Module::Luminarias => luminaire::schema(),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Module {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "juntas" | "junta" => Ok(Module::Juntas),
            "valvulas" | "válvulas" | "valvula" => Ok(Module::Valvulas),
            "cabos" | "cabo" => Ok(Module::Cabos),
            "desenhos" | "desenho" => Ok(Module::Desenhos),
            "equipamentos" | "equipamento" => Ok(Module::Equipamentos),
            "luminarias" | "luminárias" | "luminaria" => Ok(Module::Luminarias),
            _ => Err(ImportError::UnknownModule(s.to_string())),
        }
    }
}

/// Every table the project database holds
pub fn catalog() -> Vec<TableDef> {
    let mut tables: Vec<TableDef> = Module::ALL.iter().map(|m| m.schema().table_def()).collect();
    tables.extend(references::STANDALONE.iter().map(|r| r.table_def()));
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::Rule;

    #[test]
    fn test_module_round_trip_names() {
        for module in Module::ALL {
            assert_eq!(module.as_str().parse::<Module>().unwrap(), module);
            assert_eq!(module.schema().module, module.as_str());
        }
        assert_eq!("Válvulas".parse::<Module>().unwrap(), Module::Valvulas);
        assert!(matches!(
            "tubos".parse::<Module>(),
            Err(ImportError::UnknownModule(_))
        ));
    }

    #[test]
    fn test_every_module_has_natural_key() {
        for module in Module::ALL {
            let schema = module.schema();
            let key = schema.key_field().unwrap();
            assert!(key.is_required(), "{module} key must be required");
            assert!(key.unique_message().unwrap().ends_with("já existe no sistema"));
        }
    }

    #[test]
    fn test_headers_are_unique_per_module() {
        for module in Module::ALL {
            let schema = module.schema();
            let mut headers = schema.headers();
            headers.sort_unstable();
            headers.dedup();
            assert_eq!(headers.len(), schema.fields.len(), "{module}");
        }
    }

    #[test]
    fn test_reference_strengths() {
        let juntas = Module::Juntas.schema();
        let linha = juntas.field_by_header("LINHA").unwrap();
        assert!(linha
            .rules
            .iter()
            .any(|r| matches!(r, Rule::Reference { strength: crate::import::Strength::Hard, .. })));

        let cabos = Module::Cabos.schema();
        let (area, strength) = cabos.field_by_header("ÁREA").unwrap().reference_rule().unwrap();
        assert_eq!(area.set, "areas");
        assert_eq!(strength, crate::import::Strength::Soft);

        assert!(Module::Luminarias
            .schema()
            .references()
            .iter()
            .all(|r| r.set == "areas"));
    }

    #[test]
    fn test_catalog_covers_every_reference() {
        let tables = catalog();
        for module in Module::ALL {
            for reference in module.schema().references() {
                assert!(
                    tables.iter().any(|t| t.name == reference.table),
                    "missing table {}",
                    reference.table
                );
            }
        }
        assert_eq!(tables.len(), Module::ALL.len() + references::STANDALONE.len());
    }

    #[test]
    fn test_reference_lookup_by_name() {
        assert_eq!(references::by_name("Areas"), Some(references::AREAS));
        assert!(references::is_standalone(&references::LINHAS));
        assert!(!references::is_standalone(&references::DESENHOS));
        assert_eq!(references::by_name("tubos"), None);
    }
}
