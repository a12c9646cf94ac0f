//! Divination method registry and per-method input payloads
//!
//! The set of methods is closed: adding one requires a new enum variant, and
//! every match over `Method` or `MethodInput` must grow a branch before the
//! crate compiles again. That is the whole point - an unhandled method is a
//! compile error, not a silent skip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A divination method the user can select
///
/// Declaration order is registry order: the wizard presents methods and
/// sequences input collection in this order regardless of selection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Method {
    LifePathNumber,
    Palmistry,
    Astrology,
    Mbti,
    Tarot,
}

/// All methods in registry order
pub const ALL_METHODS: [Method; 5] = [
    Method::LifePathNumber,
    Method::Palmistry,
    Method::Astrology,
    Method::Mbti,
    Method::Tarot,
];

/// The 16 fixed MBTI type codes
pub const MBTI_TYPES: [&str; 16] = [
    "ISTJ", "ISFJ", "INFJ", "INTJ", "ISTP", "ISFP", "INFP", "INTP", "ESTP", "ESFP", "ENFP", "ENTP",
    "ESTJ", "ESFJ", "ENFJ", "ENTJ",
];

impl Method {
    /// Human-readable name used in prompts and report titles
    pub fn display_name(&self) -> &'static str {
        match self {
            Method::LifePathNumber => "Life Path Number",
            Method::Palmistry => "Palmistry",
            Method::Astrology => "Astrology",
            Method::Mbti => "MBTI",
            Method::Tarot => "Tarot",
        }
    }

    /// Short description for the method selection screen
    pub fn description(&self) -> &'static str {
        match self {
            Method::LifePathNumber => "Uncover your core essence through your birth date.",
            Method::Palmistry => "Interpret lines and mounts on your palm for insights.",
            Method::Astrology => "Explore celestial influences based on your birth chart.",
            Method::Mbti => "Understand your personality type and preferences.",
            Method::Tarot => "Seek guidance and clarity on your questions through tarot.",
        }
    }

    /// Identifier the persistence service expects (its naming scheme, not ours)
    pub fn backend_id(&self) -> &'static str {
        match self {
            Method::LifePathNumber => "LifePathNumber",
            Method::Palmistry => "Palmistry",
            Method::Astrology => "Astrology",
            Method::Mbti => "MBTI",
            Method::Tarot => "Tarot",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Structured input collected for one method
///
/// One variant per method; `empty_for` creates the blank record a collector
/// starts from, and `validate` implements the completeness predicate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodInput {
    LifePath {
        /// YYYY-MM-DD
        date_of_birth: String,
    },
    Palmistry {
        /// Base64-encoded JPEG of the palm
        image_base64: Option<String>,
        file_name: Option<String>,
    },
    Astrology {
        /// YYYY-MM-DD
        date_of_birth: String,
        /// HH:MM
        time_of_birth: String,
        place_of_birth: String,
    },
    Mbti {
        /// One of the 16 fixed codes, e.g. "INFJ"
        type_code: String,
    },
    Tarot {
        /// The user has "drawn cards" - there is no other input for tarot
        reading_initiated: bool,
    },
}

impl MethodInput {
    /// Blank input record for a method
    pub fn empty_for(method: Method) -> Self {
        match method {
            Method::LifePathNumber => MethodInput::LifePath {
                date_of_birth: String::new(),
            },
            Method::Palmistry => MethodInput::Palmistry {
                image_base64: None,
                file_name: None,
            },
            Method::Astrology => MethodInput::Astrology {
                date_of_birth: String::new(),
                time_of_birth: String::new(),
                place_of_birth: String::new(),
            },
            Method::Mbti => MethodInput::Mbti {
                type_code: String::new(),
            },
            Method::Tarot => MethodInput::Tarot {
                reading_initiated: false,
            },
        }
    }

    /// Which method this input belongs to
    pub fn method(&self) -> Method {
        match self {
            MethodInput::LifePath { .. } => Method::LifePathNumber,
            MethodInput::Palmistry { .. } => Method::Palmistry,
            MethodInput::Astrology { .. } => Method::Astrology,
            MethodInput::Mbti { .. } => Method::Mbti,
            MethodInput::Tarot { .. } => Method::Tarot,
        }
    }

    /// Completeness check for this input
    ///
    /// | Method         | Valid iff                                          |
    /// |----------------|----------------------------------------------------|
    /// | LifePathNumber | date of birth present                              |
    /// | Palmistry      | image payload present                              |
    /// | Astrology      | date, time present; place non-blank after trimming |
    /// | MBTI           | type code present                                  |
    /// | Tarot          | reading initiated                                  |
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MethodInput::LifePath { date_of_birth } => {
                if date_of_birth.is_empty() {
                    return Err("Date of Birth is required for Life Path Number.".to_string());
                }
            }
            MethodInput::Palmistry { image_base64, .. } => {
                if image_base64.is_none() {
                    return Err("Palm image is required for Palmistry.".to_string());
                }
            }
            MethodInput::Astrology {
                date_of_birth,
                time_of_birth,
                place_of_birth,
            } => {
                if date_of_birth.is_empty() || time_of_birth.is_empty() || place_of_birth.trim().is_empty() {
                    return Err(
                        "Date of Birth, Time of Birth, and Place of Birth are required for Astrology.".to_string(),
                    );
                }
            }
            MethodInput::Mbti { type_code } => {
                if type_code.is_empty() {
                    return Err("MBTI type is required. Please select your type.".to_string());
                }
            }
            MethodInput::Tarot { reading_initiated } => {
                if !reading_initiated {
                    return Err("Please draw card(s) for the Tarot reading.".to_string());
                }
            }
        }
        Ok(())
    }

    /// Date-of-birth field, if this input variant carries one
    pub fn date_of_birth(&self) -> Option<&str> {
        match self {
            MethodInput::LifePath { date_of_birth } | MethodInput::Astrology { date_of_birth, .. } => {
                Some(date_of_birth)
            }
            _ => None,
        }
    }

    /// Overwrite the date-of-birth field; no-op for variants without one
    pub fn set_date_of_birth(&mut self, dob: &str) {
        match self {
            MethodInput::LifePath { date_of_birth } | MethodInput::Astrology { date_of_birth, .. } => {
                *date_of_birth = dob.to_string();
            }
            _ => {}
        }
    }
}

/// Map of collected inputs, keyed by method
///
/// A BTreeMap so iteration follows registry order; keys exist only for
/// methods the user has actually provided input for.
pub type UserInputs = BTreeMap<Method, MethodInput>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        assert_eq!(ALL_METHODS[0], Method::LifePathNumber);
        assert_eq!(ALL_METHODS[4], Method::Tarot);
        // BTreeMap ordering must match registry order
        let mut inputs = UserInputs::new();
        inputs.insert(Method::Tarot, MethodInput::empty_for(Method::Tarot));
        inputs.insert(Method::LifePathNumber, MethodInput::empty_for(Method::LifePathNumber));
        let keys: Vec<_> = inputs.keys().copied().collect();
        assert_eq!(keys, vec![Method::LifePathNumber, Method::Tarot]);
    }

    #[test]
    fn test_empty_inputs_are_incomplete() {
        for method in ALL_METHODS {
            let input = MethodInput::empty_for(method);
            assert_eq!(input.method(), method);
            assert!(input.validate().is_err(), "empty {method} input should be invalid");
        }
    }

    #[test]
    fn test_life_path_validation() {
        let input = MethodInput::LifePath {
            date_of_birth: "1990-04-12".to_string(),
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_astrology_blank_place_rejected() {
        let input = MethodInput::Astrology {
            date_of_birth: "1990-04-12".to_string(),
            time_of_birth: "08:30".to_string(),
            place_of_birth: "   ".to_string(),
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_tarot_requires_initiation() {
        let mut input = MethodInput::empty_for(Method::Tarot);
        assert!(input.validate().is_err());
        input = MethodInput::Tarot { reading_initiated: true };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_date_of_birth_accessors() {
        let mut astro = MethodInput::empty_for(Method::Astrology);
        astro.set_date_of_birth("2000-01-01");
        assert_eq!(astro.date_of_birth(), Some("2000-01-01"));

        let mut tarot = MethodInput::empty_for(Method::Tarot);
        tarot.set_date_of_birth("2000-01-01");
        assert_eq!(tarot.date_of_birth(), None);
    }

    #[test]
    fn test_backend_ids() {
        assert_eq!(Method::LifePathNumber.backend_id(), "LifePathNumber");
        assert_eq!(Method::Mbti.backend_id(), "MBTI");
    }
}
