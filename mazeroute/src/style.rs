//! Routing styles: the knobs of one named parameter set, and the
//! line-oriented style file they are read from.
//!
//! A style file looks like:
//!
//! ```text
//! # two-layer style
//! layer   m1  1 1 2 0 10
//! layer   m2  1 1 2 0 10
//! contact via m1 m2 5
//! spacing m1  m1 1
//! wWidth  10000
//! ```
//!
//! `#` starts a comment. Unknown options and malformed values are
//! configuration errors; routing never starts on a bad style.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// Errors raised while parsing or validating a style.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StyleError {
    /// An option line had the wrong number of arguments.
    #[error("line {line}: option `{option}` expects {expected} arguments")]
    BadArity {
        /// 1-based line number.
        line: usize,
        /// The offending option.
        option: String,
        /// How many arguments it takes.
        expected: usize,
    },
    /// An argument failed to parse as a number.
    #[error("line {line}: bad numeric argument `{value}`")]
    BadNumber {
        /// 1-based line number.
        line: usize,
        /// The unparsable token.
        value: String,
    },
    /// An unrecognised option name.
    #[error("line {line}: unknown option `{option}`")]
    UnknownOption {
        /// 1-based line number.
        line: usize,
        /// The offending option.
        option: String,
    },
    /// A layer or material name that was never declared.
    #[error("unknown layer `{name}`")]
    UnknownLayer {
        /// The undeclared name.
        name: String,
    },
    /// A contact whose residues are not two distinct declared layers.
    #[error("contact `{name}` must join two distinct declared layers")]
    BadContact {
        /// The offending contact.
        name: String,
    },
    /// A style with no layers cannot route.
    #[error("style declares no layers")]
    NoLayers,
}

/// Search-control parameters of a style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MazeParams {
    /// Overshoot penalty numerator.
    pub penalty_mantissa: i64,
    /// Overshoot penalty denominator exponent: penalty = mantissa / 2^exp.
    pub penalty_nexp: u32,
    /// Window shift per bloom, in cost units.
    pub window_rate: i64,
    /// Window width, in cost units.
    pub window_width: i64,
    /// Cost increase allowed within one bloom.
    pub bloom_delta_cost: i64,
    /// Minimum radius of generated blockage around an expansion point.
    /// `-1` derives a value from the design rules.
    pub bounds_increment: i64,
    /// Whether to build the full estimation plane.
    pub estimate: bool,
    /// Whether routes may start or end anywhere on the electrically
    /// connected node.
    pub expand_endpoints: bool,
    /// Whether only the top cell's hints are honored.
    pub top_hints_only: bool,
    /// Maximum distance a route may penetrate same-node blockage to reach
    /// the destination. `-1` derives a value from the design rules.
    pub max_walk_length: i64,
    /// 0 = warnings only, 1 = per-route summaries, 2 = per-path decisions.
    pub verbosity: u8,
    /// Upper limit on blooms; 0 = unlimited.
    pub bloom_limit: u32,
}

impl Default for MazeParams {
    fn default() -> Self {
        Self {
            penalty_mantissa: 2048,
            penalty_nexp: 1,
            window_rate: 500,
            window_width: 10_000,
            bloom_delta_cost: 1,
            bounds_increment: -1,
            estimate: true,
            expand_endpoints: true,
            top_hints_only: false,
            max_walk_length: -1,
            verbosity: 1,
            bloom_limit: 0,
        }
    }
}

/// A `layer` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDef {
    /// Material name.
    pub name: ArcStr,
    /// Horizontal cost per unit.
    pub h_cost: i64,
    /// Vertical cost per unit.
    pub v_cost: i64,
    /// Jog cost.
    pub jog_cost: i64,
    /// Hint-alignment cost.
    pub hint_cost: i64,
    /// Over-route cost per unit.
    pub over_cost: i64,
}

/// A `contact` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDef {
    /// Contact name.
    pub name: ArcStr,
    /// First residue layer.
    pub layer1: String,
    /// Second residue layer.
    pub layer2: String,
    /// Placement cost.
    pub cost: i64,
}

/// A named routing parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MazeStyle {
    /// Style name.
    pub name: ArcStr,
    /// Declared layers, in declaration order.
    pub layers: Vec<LayerDef>,
    /// Declared contacts, in declaration order.
    pub contacts: Vec<ContactDef>,
    /// `spacing` entries `(material, against, distance)`.
    pub spacings: Vec<(String, String, i64)>,
    /// `width` entries.
    pub widths: Vec<(String, i64)>,
    /// `length` entries.
    pub lengths: Vec<(String, i64)>,
    /// Search parameters.
    pub params: MazeParams,
}

impl MazeStyle {
    /// An empty style with default parameters.
    pub fn named(name: &str) -> Self {
        Self {
            name: ArcStr::from(name),
            layers: Vec::new(),
            contacts: Vec::new(),
            spacings: Vec::new(),
            widths: Vec::new(),
            lengths: Vec::new(),
            params: MazeParams::default(),
        }
    }

    /// The declared width of a material, if any.
    pub fn width_of(&self, name: &str) -> Option<i64> {
        self.widths.iter().find(|(n, _)| n == name).map(|&(_, w)| w)
    }

    /// The declared length of a material, if any.
    pub fn length_of(&self, name: &str) -> Option<i64> {
        self.lengths.iter().find(|(n, _)| n == name).map(|&(_, l)| l)
    }

    /// Parses a style file.
    pub fn parse(name: &str, text: &str) -> Result<MazeStyle, StyleError> {
        let mut style = MazeStyle::named(name);
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let body = raw.split('#').next().unwrap_or("");
            let mut tokens = body.split_whitespace();
            let Some(option) = tokens.next() else {
                continue;
            };
            let args: Vec<&str> = tokens.collect();
            let arity = |expected: usize| -> Result<(), StyleError> {
                if args.len() == expected {
                    Ok(())
                } else {
                    Err(StyleError::BadArity {
                        line,
                        option: option.to_string(),
                        expected,
                    })
                }
            };
            let num = |s: &str| -> Result<i64, StyleError> {
                s.parse().map_err(|_| StyleError::BadNumber {
                    line,
                    value: s.to_string(),
                })
            };
            match option {
                "layer" => {
                    arity(6)?;
                    style.layers.push(LayerDef {
                        name: ArcStr::from(args[0]),
                        h_cost: num(args[1])?,
                        v_cost: num(args[2])?,
                        jog_cost: num(args[3])?,
                        hint_cost: num(args[4])?,
                        over_cost: num(args[5])?,
                    });
                }
                "contact" => {
                    arity(4)?;
                    style.contacts.push(ContactDef {
                        name: ArcStr::from(args[0]),
                        layer1: args[1].to_string(),
                        layer2: args[2].to_string(),
                        cost: num(args[3])?,
                    });
                }
                "spacing" => {
                    arity(3)?;
                    style
                        .spacings
                        .push((args[0].to_string(), args[1].to_string(), num(args[2])?));
                }
                "width" => {
                    arity(2)?;
                    style.widths.push((args[0].to_string(), num(args[1])?));
                }
                "length" => {
                    arity(2)?;
                    style.lengths.push((args[0].to_string(), num(args[1])?));
                }
                "penalty" => {
                    arity(2)?;
                    style.params.penalty_mantissa = num(args[0])?;
                    style.params.penalty_nexp = num(args[1])? as u32;
                }
                "wWidth" => {
                    arity(1)?;
                    style.params.window_width = num(args[0])?;
                }
                "wRate" => {
                    arity(1)?;
                    style.params.window_rate = num(args[0])?;
                }
                "bloomDeltaCost" => {
                    arity(1)?;
                    style.params.bloom_delta_cost = num(args[0])?;
                }
                "boundsIncrement" => {
                    arity(1)?;
                    style.params.bounds_increment = num(args[0])?;
                }
                "estimate" => {
                    arity(1)?;
                    style.params.estimate = num(args[0])? != 0;
                }
                "expandEndpoints" => {
                    arity(1)?;
                    style.params.expand_endpoints = num(args[0])? != 0;
                }
                "topHintsOnly" => {
                    arity(1)?;
                    style.params.top_hints_only = num(args[0])? != 0;
                }
                "maxWalkLength" => {
                    arity(1)?;
                    style.params.max_walk_length = num(args[0])?;
                }
                "verbosity" => {
                    arity(1)?;
                    style.params.verbosity = num(args[0])? as u8;
                }
                "bloomLimit" => {
                    arity(1)?;
                    style.params.bloom_limit = num(args[0])? as u32;
                }
                _ => {
                    return Err(StyleError::UnknownOption {
                        line,
                        option: option.to_string(),
                    })
                }
            }
        }
        if style.layers.is_empty() {
            return Err(StyleError::NoLayers);
        }
        Ok(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_style() {
        let text = "\
# test style
layer   m1  1 5 2 0 10
layer   m2  5 1 2 0 10
contact via m1 m2 3
spacing m1  m1 1
spacing via m1 1   # contact spacing
width   m1  1
wWidth  400
wRate   50
bloomDeltaCost 2
boundsIncrement -1
estimate 1
expandEndpoints 0
topHintsOnly 1
maxWalkLength 6
verbosity 0
bloomLimit 100
penalty 1024 2
";
        let s = MazeStyle::parse("test", text).unwrap();
        assert_eq!(s.layers.len(), 2);
        assert_eq!(s.contacts.len(), 1);
        assert_eq!(s.spacings.len(), 2);
        assert_eq!(s.params.window_width, 400);
        assert_eq!(s.params.window_rate, 50);
        assert_eq!(s.params.bloom_delta_cost, 2);
        assert!(!s.params.expand_endpoints);
        assert!(s.params.top_hints_only);
        assert_eq!(s.params.max_walk_length, 6);
        assert_eq!(s.params.bloom_limit, 100);
        assert_eq!(s.params.penalty_mantissa, 1024);
        assert_eq!(s.params.penalty_nexp, 2);
    }

    #[test]
    fn rejects_unknown_options_and_bad_numbers() {
        assert!(matches!(
            MazeStyle::parse("t", "layer m1 1 1 0 0 0\nfrobnicate 1"),
            Err(StyleError::UnknownOption { line: 2, .. })
        ));
        assert!(matches!(
            MazeStyle::parse("t", "layer m1 1 x 0 0 0"),
            Err(StyleError::BadNumber { line: 1, .. })
        ));
        assert!(matches!(
            MazeStyle::parse("t", "wWidth 100"),
            Err(StyleError::NoLayers)
        ));
    }
}
