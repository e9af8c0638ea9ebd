//! `get_internal` / `post_internal`: the interpreter side of the bridge.
//!
//! Both functions validate argument shapes, look up the invocation's
//! [`InvocationContext`] and block the script thread on the async bridge
//! call. Any error aborts the script.

use anyhow::anyhow;
use starlark::environment::GlobalsBuilder;
use starlark::eval::Evaluator;
use starlark::starlark_module;
use starlark::values::dict::DictRef;
use starlark::values::Value;

use super::{BridgeError, BridgeResult, PostBody};
use crate::capability::InvocationContext;

/// Registers the two bridge primitives.
#[starlark_module]
pub(crate) fn bridge_functions(builder: &mut GlobalsBuilder) {
    /// `get_internal(url, headers=None) -> (status, body, is_json)`
    fn get_internal<'v>(
        #[starlark(require = pos)] url: Value<'v>,
        #[starlark(require = pos)] headers: Option<Value<'v>>,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<(i32, String, bool)> {
        let url = unpack_url(url)?;
        let headers = unpack_headers(headers)?;
        let context = invocation_context(eval)?;
        let response = context.block_on(context.bridge().get(url, &headers))?;
        Ok(response.into_tuple())
    }

    /// `post_internal(url, *, headers=None, data=None, json=None) -> (status, body, is_json)`
    fn post_internal<'v>(
        #[starlark(require = pos)] url: Value<'v>,
        #[starlark(require = named)] headers: Option<Value<'v>>,
        #[starlark(require = named)] data: Option<Value<'v>>,
        #[starlark(require = named)] json: Option<Value<'v>>,
        eval: &mut Evaluator<'v, '_>,
    ) -> anyhow::Result<(i32, String, bool)> {
        let url = unpack_url(url)?;
        let headers = unpack_headers(headers)?;
        let body = match (present(json), present(data)) {
            (Some(json), _) => PostBody::Json(unpack_text(json, "json")?),
            (None, Some(data)) => PostBody::Text(unpack_text(data, "data")?),
            (None, None) => PostBody::Empty,
        };
        let context = invocation_context(eval)?;
        let response = context.block_on(context.bridge().post(url, &headers, body))?;
        Ok(response.into_tuple())
    }
}

fn invocation_context<'a>(eval: &Evaluator<'_, 'a>) -> anyhow::Result<&'a InvocationContext> {
    eval.extra
        .and_then(|extra| extra.downcast_ref::<InvocationContext>())
        .ok_or_else(|| anyhow!("network access is not available to this script"))
}

/// `None` and an explicit Starlark `None` are the same thing to the bridge.
fn present(value: Option<Value<'_>>) -> Option<Value<'_>> {
    value.filter(|v| !v.is_none())
}

fn unpack_url(value: Value<'_>) -> BridgeResult<&str> {
    value
        .unpack_str()
        .ok_or_else(|| BridgeError::InvalidArgument("Url must be a string".to_string()))
}

fn unpack_text(value: Value<'_>, name: &str) -> BridgeResult<String> {
    value.unpack_str().map(str::to_owned).ok_or_else(|| {
        BridgeError::InvalidArgument(format!(
            "{name} must be a string, not {}",
            value.get_type()
        ))
    })
}

fn unpack_headers(value: Option<Value<'_>>) -> BridgeResult<Vec<(String, String)>> {
    let Some(value) = present(value) else {
        return Ok(Vec::new());
    };
    let dict = DictRef::from_value(value).ok_or_else(|| {
        BridgeError::InvalidArgument(format!(
            "headers must be a dictionary, not {}",
            value.get_type()
        ))
    })?;
    dict.iter()
        .map(|(key, val)| match (key.unpack_str(), val.unpack_str()) {
            (Some(key), Some(val)) => Ok((key.to_owned(), val.to_owned())),
            _ => Err(BridgeError::InvalidArgument(
                "headers dictionary must be of type string -> string".to_string(),
            )),
        })
        .collect()
}
