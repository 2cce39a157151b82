#[cfg(test)]
pub mod test {
    use serde::{Deserialize, Serialize};

    use crate::items::{Item, MultiItem, Tree};
    use crate::parsers::FlagEnum;

    /// The tree used by end-to-end tests: scalars, a nested branch, a
    /// sequence, and a multi flag.
    pub fn settings_tree() -> Tree {
        Tree::new()
            .item(
                "mode",
                Item::enumeration(Some("pad"), &["pad", "crop"], false).unwrap(),
            )
            .item("retries", Item::integer(Some(3)))
            .item("verbose", Item::boolean(Some(false)))
            .branch(
                "limits",
                Tree::new()
                    .item("width", Item::integer(Some(5)))
                    .item("ratio", Item::float(Some(0.5))),
            )
            .item(
                "sizes",
                Item::sequence(Some(vec![1.into(), 2.into()])).unwrap(),
            )
            .multi("tags", MultiItem::string(Some(&["alpha"])).unwrap())
    }

    // -- Fixture for enum-class tests --------------------------------------

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Fit {
        Pad,
        Crop,
    }

    impl FlagEnum for Fit {
        const VARIANTS: &'static [&'static str] = &["pad", "crop"];

        fn flag_name(&self) -> &'static str {
            match self {
                Fit::Pad => "pad",
                Fit::Crop => "crop",
            }
        }

        fn from_flag_name(name: &str) -> Option<Self> {
            match name {
                "pad" => Some(Fit::Pad),
                "crop" => Some(Fit::Crop),
                _ => None,
            }
        }
    }

    // -- Fixture for instance-derivation tests -----------------------------

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    pub struct Replay {
        pub capacity: i64,
        pub priority_exponent: f64,
        pub seed: Option<i64>,
    }

    pub fn sample_replay() -> Replay {
        Replay {
            capacity: 10_000,
            priority_exponent: 0.8,
            seed: None,
        }
    }
}
