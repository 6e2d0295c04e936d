//! Recognition table for indirect objects.
//!
//! Each rule is the exact sequence of marker kinds expected after an
//! object-start marker. Rules are tried in order and the first one whose
//! sequence matches wins, so the keyed dictionary rows sit above the
//! generic ones.

use crate::marker::{DictKey, MarkerKind, ObjectType};

/// One position in a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Dict,
    AnyValue,
    Key(DictKey),
    Stream,
    EndStream,
    EndObj,
}

impl Expect {
    pub fn accepts(self, kind: &MarkerKind) -> bool {
        match (self, kind) {
            (Self::Dict, MarkerKind::Value(ObjectType::Dict)) => true,
            (Self::AnyValue, MarkerKind::Value(_)) => true,
            (Self::Key(want), MarkerKind::Key(got)) => want == *got,
            (Self::Stream, MarkerKind::Stream) => true,
            (Self::EndStream, MarkerKind::EndStream) => true,
            (Self::EndObj, MarkerKind::EndObj) => true,
            _ => false,
        }
    }
}

/// Region shape produced by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    XRefStream,
    ObjectStream,
    LinearizationDict,
    Stream,
    Plain,
}

#[derive(Debug)]
pub struct Rule {
    pub shape: Shape,
    pub sequence: &'static [Expect],
}

impl Rule {
    pub fn matches(&self, kinds: &[&MarkerKind]) -> bool {
        self.sequence.len() == kinds.len()
            && self
                .sequence
                .iter()
                .zip(kinds)
                .all(|(expect, kind)| expect.accepts(kind))
    }
}

use Expect::*;

pub static RULES: &[Rule] = &[
    Rule {
        shape: Shape::XRefStream,
        sequence: &[Dict, Key(DictKey::XRef), Stream, EndStream, EndObj],
    },
    Rule {
        shape: Shape::ObjectStream,
        sequence: &[Dict, Key(DictKey::ObjStm), Stream, EndStream, EndObj],
    },
    Rule {
        shape: Shape::LinearizationDict,
        sequence: &[Dict, Key(DictKey::Linearized), EndObj],
    },
    Rule {
        shape: Shape::Stream,
        sequence: &[Dict, Stream, EndStream, EndObj],
    },
    Rule {
        shape: Shape::Plain,
        sequence: &[AnyValue, EndObj],
    },
];

/// First rule accepting the markers that follow an object start.
pub fn recognize(kinds: &[&MarkerKind]) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.matches(kinds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_of(kinds: &[MarkerKind]) -> Option<Shape> {
        let refs: Vec<&MarkerKind> = kinds.iter().collect();
        recognize(&refs).map(|r| r.shape)
    }

    #[test]
    fn keyed_rows_win_over_plain_stream() {
        let xref = [
            MarkerKind::Value(ObjectType::Dict),
            MarkerKind::Key(DictKey::XRef),
            MarkerKind::Stream,
            MarkerKind::EndStream,
            MarkerKind::EndObj,
        ];
        assert_eq!(shape_of(&xref), Some(Shape::XRefStream));

        let plain = [
            MarkerKind::Value(ObjectType::Dict),
            MarkerKind::Stream,
            MarkerKind::EndStream,
            MarkerKind::EndObj,
        ];
        assert_eq!(shape_of(&plain), Some(Shape::Stream));
    }

    #[test]
    fn any_value_type_closes_with_endobj() {
        for ty in [ObjectType::Array, ObjectType::Dict, ObjectType::Number, ObjectType::Unknown] {
            assert_eq!(
                shape_of(&[MarkerKind::Value(ty), MarkerKind::EndObj]),
                Some(Shape::Plain)
            );
        }
    }

    #[test]
    fn stream_on_non_dict_is_rejected() {
        let kinds = [
            MarkerKind::Value(ObjectType::Array),
            MarkerKind::Stream,
            MarkerKind::EndStream,
            MarkerKind::EndObj,
        ];
        assert_eq!(shape_of(&kinds), None);
        assert_eq!(shape_of(&[MarkerKind::Value(ObjectType::Dict)]), None);
    }
}
