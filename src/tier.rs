use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification bands applied to the overall indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "Excelência")]
    Excelencia,
    #[serde(rename = "Avançado")]
    Avancado,
    #[serde(rename = "Intermediário")]
    Intermediario,
    #[serde(rename = "Básico")]
    Basico,
    #[serde(rename = "Inicial")]
    Inicial,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Excelencia,
        Tier::Avancado,
        Tier::Intermediario,
        Tier::Basico,
        Tier::Inicial,
    ];

    pub fn classify(overall: f64) -> Self {
        match overall {
            value if value >= 90.0 => Tier::Excelencia,
            value if value >= 70.0 => Tier::Avancado,
            value if value >= 50.0 => Tier::Intermediario,
            value if value >= 30.0 => Tier::Basico,
            _ => Tier::Inicial,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Excelencia => "Excelência",
            Tier::Avancado => "Avançado",
            Tier::Intermediario => "Intermediário",
            Tier::Basico => "Básico",
            Tier::Inicial => "Inicial",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
