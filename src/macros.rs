/// Builds a [`Value`](crate::Value) from a JSON-like literal.
///
/// Keys must be string literals. Any other expression is converted through
/// [`to_value`](crate::to_value); values with no BTOON mapping become `null`.
///
/// ```rust
/// use btoon::{btoon, Value};
///
/// let id = 7;
/// let value = btoon!({
///     "id": id,
///     "tags": ["a", "b"],
///     "score": 9.5,
///     "parent": null
/// });
/// assert_eq!(value.get("id"), Some(&Value::Int(7)));
/// ```
#[macro_export]
macro_rules! btoon {
    (null) => {
        $crate::Value::Null
    };

    (true) => {
        $crate::Value::Bool(true)
    };

    (false) => {
        $crate::Value::Bool(false)
    };

    ([]) => {
        $crate::Value::List(vec![])
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::List(vec![$($crate::btoon!($elem)),*])
    };

    ({}) => {
        $crate::Value::Map($crate::BtoonMap::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut map = $crate::BtoonMap::new();
        $(
            map.insert($key.to_string(), $crate::btoon!($value));
        )*
        $crate::Value::Map(map)
    }};

    ($other:expr) => {
        $crate::to_value(&$other).unwrap_or($crate::Value::Null)
    };
}
