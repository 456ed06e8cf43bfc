//! Closed description of a parameter's declared type.
//!
//! A `TypeShape` is built once when a command's schema is declared and is
//! walked recursively by the coercion engine, by the binder (to decide how
//! many tokens an option consumes and whether it is negatable) and by the
//! help collaborator (to list valid choices). Keeping all three on the same
//! walk is what keeps help and parsing in agreement.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Bool,
    Int,
    Float,
    Str,
    /// Either the inner type or nothing.
    Optional(Box<TypeShape>),
    /// Members are tried in declaration order; the first that converts wins.
    Union(Vec<TypeShape>),
    /// A fixed, case-sensitive set of string values.
    Literal(Vec<String>),
    /// Named members, matched by member name.
    Enum { name: String, members: Vec<String> },
    /// Variable number of elements; repeated options append.
    List(Box<TypeShape>),
    /// Fixed number of heterogeneous elements.
    Tuple(Vec<TypeShape>),
}

impl TypeShape {
    pub fn optional(inner: TypeShape) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(inner: TypeShape) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn tuple(elements: impl IntoIterator<Item = TypeShape>) -> Self {
        Self::Tuple(elements.into_iter().collect())
    }

    pub fn union(members: impl IntoIterator<Item = TypeShape>) -> Self {
        Self::Union(members.into_iter().collect())
    }

    pub fn literal<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::Literal(values.into_iter().map(Into::into).collect())
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::Enum {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Strip any number of `Optional` wrappers.
    pub fn unwrap_optional(&self) -> &TypeShape {
        match self {
            Self::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Boolean parameters act as zero-argument flags and get `--no-` negatives.
    pub fn is_bool(&self) -> bool {
        matches!(self.unwrap_optional(), Self::Bool)
    }

    /// List parameters can be reset to empty with an `--empty-` negative.
    pub fn is_list(&self) -> bool {
        matches!(self.unwrap_optional(), Self::List(_))
    }

    /// Number of tokens one occurrence of this type consumes.
    ///
    /// Unions consume as many tokens as their first member; lists consume
    /// one element's worth per occurrence.
    pub fn token_count(&self) -> usize {
        match self {
            Self::Bool
            | Self::Int
            | Self::Float
            | Self::Str
            | Self::Literal(_)
            | Self::Enum { .. } => 1,
            Self::Optional(inner) | Self::List(inner) => inner.token_count(),
            Self::Union(members) => members.first().map_or(1, TypeShape::token_count),
            Self::Tuple(elements) => elements.iter().map(TypeShape::token_count).sum(),
        }
    }

    /// Valid choices, if the shape restricts its values.
    ///
    /// Unions concatenate the choices of their members in declaration order,
    /// skipping duplicates.
    pub fn choices(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_choices(&mut out);
        out
    }

    fn collect_choices(&self, out: &mut Vec<String>) {
        match self {
            Self::Literal(values) => push_unique(out, values),
            Self::Enum { members, .. } => push_unique(out, members),
            Self::Optional(inner) | Self::List(inner) => inner.collect_choices(out),
            Self::Union(members) => {
                for member in members {
                    member.collect_choices(out);
                }
            }
            Self::Bool | Self::Int | Self::Float | Self::Str | Self::Tuple(_) => {}
        }
    }
}

fn push_unique(out: &mut Vec<String>, values: &[String]) {
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[TypeShape], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::Optional(inner) => write!(f, "Option<{inner}>"),
            Self::Union(members) => join(f, members, " | "),
            Self::Literal(values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
                f.write_str(&quoted.join(" | "))
            }
            Self::Enum { name, .. } => f.write_str(name),
            Self::List(inner) => write!(f, "List<{inner}>"),
            Self::Tuple(elements) => {
                f.write_str("(")?;
                join(f, elements, ", ")?;
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_counts_follow_structure() {
        assert_eq!(TypeShape::Int.token_count(), 1);
        assert_eq!(
            TypeShape::tuple([TypeShape::Int, TypeShape::Str, TypeShape::Float]).token_count(),
            3
        );
        assert_eq!(
            TypeShape::list(TypeShape::tuple([TypeShape::Int, TypeShape::Int])).token_count(),
            2
        );
        assert_eq!(
            TypeShape::optional(TypeShape::list(TypeShape::Str)).token_count(),
            1
        );
    }

    #[test]
    fn negatable_shapes_see_through_optional() {
        assert!(TypeShape::optional(TypeShape::Bool).is_bool());
        assert!(TypeShape::optional(TypeShape::list(TypeShape::Int)).is_list());
        assert!(!TypeShape::tuple([TypeShape::Bool]).is_bool());
        assert!(!TypeShape::Str.is_list());
    }

    #[test]
    fn union_choices_concatenate_in_order() {
        let shape = TypeShape::union([
            TypeShape::Int,
            TypeShape::literal(["fizz", "buzz"]),
            TypeShape::literal(["bar"]),
        ]);
        assert_eq!(shape.choices(), vec!["fizz", "buzz", "bar"]);
        assert!(TypeShape::Int.choices().is_empty());
    }

    #[test]
    fn enum_choices_are_member_names() {
        let shape = TypeShape::optional(TypeShape::enumeration("Problem", ["fizz", "buzz"]));
        assert_eq!(shape.choices(), vec!["fizz", "buzz"]);
        assert_eq!(shape.to_string(), "Option<Problem>");
    }

    #[test]
    fn display_is_readable() {
        let shape = TypeShape::list(TypeShape::tuple([TypeShape::Int, TypeShape::Str]));
        assert_eq!(shape.to_string(), "List<(int, str)>");
        assert_eq!(
            TypeShape::literal(["a", "b"]).to_string(),
            "\"a\" | \"b\""
        );
    }
}
