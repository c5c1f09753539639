//! 工具参数：类型化参数记录 + JSON Schema 生成（schemars）
//!
//! 每个工具声明一个 `#[derive(Deserialize, JsonSchema)]` 参数结构体：
//! schema_for_args 生成发给后端的 parameters，parse_args 在调用前把原始 JSON 校验为该结构体。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tools::ToolError;

/// 参数结构体的 JSON Schema（去掉 $schema / title，只保留 object 描述）
pub fn schema_for_args<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("properties").or_insert_with(|| serde_json::json!({}));
    }
    value
}

/// 把原始 JSON 参数校验并转换为参数结构体；缺字段、类型不符、多余字段都会报 InvalidArguments
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Debug, Deserialize, JsonSchema)]
    #[serde(deny_unknown_fields)]
    struct HostArgs {
        /// Host name
        host: String,
        #[serde(default)]
        verbose: bool,
    }

    #[test]
    fn test_schema_lists_required() {
        let schema = schema_for_args::<HostArgs>();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["host"].is_object());
        assert_eq!(schema["required"], serde_json::json!(["host"]));
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn test_parse_args_validation() {
        let ok: HostArgs = parse_args(serde_json::json!({"host": "example.com"})).unwrap();
        assert_eq!(ok.host, "example.com");

        assert!(matches!(
            parse_args::<HostArgs>(serde_json::json!({})),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_args::<HostArgs>(serde_json::json!({"host": 42})),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_args::<HostArgs>(serde_json::json!({"host": "a", "extra": 1})),
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
