use super::value::{FromValue, Value};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    InputOutput,
    Output,
}

/// A named procedure argument. Output and input/output parameters are written
/// back by the executor after the call.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub direction: Direction,
    pub value: Value,
}

impl Parameter {
    pub fn input(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::Input,
            value: value.into(),
        }
    }

    pub fn input_output(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::InputOutput,
            value: value.into(),
        }
    }

    pub fn output(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::Output,
            value: Value::Null,
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self::input(name, value)
    }

    pub fn int(name: &str, value: i64) -> Self {
        Self::input(name, value)
    }

    pub fn boolean(name: &str, value: bool) -> Self {
        Self::input(name, value)
    }

    pub fn null(name: &str) -> Self {
        Self::input(name, Value::Null)
    }

    /// True for parameters the executor reports a value back into.
    pub fn is_returned(&self) -> bool {
        self.direction != Direction::Input
    }

    pub fn get<T: FromValue>(&self) -> Result<T> {
        T::from_value(&self.value)
    }
}

/// The parameter called `name` in `params`, ignoring case and a leading `@`.
pub fn find<'a>(params: &'a [Parameter], name: &str) -> Option<&'a Parameter> {
    let wanted = name.trim_start_matches('@');
    params
        .iter()
        .find(|p| p.name.trim_start_matches('@').eq_ignore_ascii_case(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_helpers_set_direction() {
        assert_eq!(Parameter::int("@id", 3).direction, Direction::Input);
        assert_eq!(Parameter::output("@total").value, Value::Null);
        assert!(Parameter::output("@total").is_returned());
        assert!(Parameter::input_output("@count", 1).is_returned());
        assert!(!Parameter::text("@name", "x").is_returned());
    }

    #[test]
    fn test_find_ignores_prefix_and_case() {
        let params = vec![Parameter::int("@UserId", 9), Parameter::output("total")];
        assert_eq!(find(&params, "userid").unwrap().get::<i64>().unwrap(), 9);
        assert!(find(&params, "@Total").is_some());
        assert!(find(&params, "missing").is_none());
    }
}
