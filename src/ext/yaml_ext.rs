use std::borrow::Cow;

use hashlink::LinkedHashMap;
use saphyr::{Scalar, Yaml};

pub trait YamlMappingExt<'input> {
    fn field(&self, name: &'static str) -> Option<&Yaml<'input>>;
}

impl<'input> YamlMappingExt<'input> for LinkedHashMap<Yaml<'input>, Yaml<'input>> {
    fn field(&self, name: &'static str) -> Option<&Yaml<'input>> {
        self.get(&Yaml::Value(Scalar::String(Cow::Borrowed(name))))
    }
}

/// Text of a string, integer or boolean scalar.
pub fn scalar_text(yaml: &Yaml) -> Option<String> {
    match yaml {
        Yaml::Value(Scalar::String(text)) => Some(text.to_string()),
        Yaml::Value(Scalar::Integer(number)) => Some(number.to_string()),
        Yaml::Value(Scalar::Boolean(flag)) => Some(flag.to_string()),
        _ => None,
    }
}

/// Scalars of a sequence, or a single scalar as a one-element list.
pub fn scalar_list(yaml: &Yaml) -> Option<Vec<String>> {
    match yaml {
        Yaml::Sequence(items) => items.iter().map(scalar_text).collect(),
        other => scalar_text(other).map(|text| vec![text]),
    }
}

pub fn scalar_bool(yaml: &Yaml) -> Option<bool> {
    match yaml {
        Yaml::Value(Scalar::Boolean(flag)) => Some(*flag),
        _ => None,
    }
}
