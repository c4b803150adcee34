use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum_macros::EnumIter;

/// Game type a rating is scoped to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ca,
    Ffa,
    Ctf,
    Duel,
    Tdm
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ca => "ca",
            Category::Ffa => "ffa",
            Category::Ctf => "ctf",
            Category::Duel => "duel",
            Category::Tdm => "tdm"
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ca" => Ok(Category::Ca),
            "ffa" => Ok(Category::Ffa),
            "ctf" => Ok(Category::Ctf),
            "duel" => Ok(Category::Duel),
            "tdm" => Ok(Category::Tdm),
            _ => Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::structures::category::Category;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_lowercase() {
        assert_eq!("ca".parse(), Ok(Category::Ca));
    }

    #[test]
    fn test_parse_mixed_case() {
        assert_eq!("Duel".parse(), Ok(Category::Duel));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!("race".parse::<Category>(), Err(()));
    }

    #[test]
    fn test_display_matches_parse() {
        for category in Category::iter() {
            assert_eq!(category.to_string().parse(), Ok(category));
        }
    }

    #[test]
    fn test_enumerate() {
        let categories = Category::iter().collect::<Vec<_>>();
        assert_eq!(
            categories,
            vec![Category::Ca, Category::Ffa, Category::Ctf, Category::Duel, Category::Tdm]
        );
    }
}
