//! Embedded prompt templates
//!
//! These are compiled into the binary from .pmt files at build time.

/// Life Path Number analysis prompt
pub const LIFE_PATH: &str = include_str!("../../prompts/life-path.pmt");

/// Palmistry analysis prompt (the palm image travels as a separate part)
pub const PALMISTRY: &str = include_str!("../../prompts/palmistry.pmt");

/// Astrological profile prompt
pub const ASTROLOGY: &str = include_str!("../../prompts/astrology.pmt");

/// MBTI type analysis prompt
pub const MBTI: &str = include_str!("../../prompts/mbti.pmt");

/// Conceptual tarot reading prompt
pub const TAROT: &str = include_str!("../../prompts/tarot.pmt");

/// Cross-method synthesis prompt
pub const INTEGRATED: &str = include_str!("../../prompts/integrated.pmt");

/// Character archetype tag extraction prompt
pub const TAGS: &str = include_str!("../../prompts/tags.pmt");

/// System instruction for the post-reading chat companion
pub const CHAT_SYSTEM: &str = include_str!("../../prompts/chat-system.pmt");
