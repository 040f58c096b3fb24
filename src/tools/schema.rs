//! 工具描述与参数 Schema 生成
//!
//! 参数 schema 由 schemars 从强类型参数结构体生成，使用 OpenAPI 3 设置：
//! 可选字段输出为 `nullable` 而不是 `["string","null"]`（Gemini 只接受 OpenAPI 子集）。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

/// 广播给 Planner 的工具描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 生成 `T` 的参数 schema，去掉根上的 `$schema` / `title` / `definitions`
pub fn parameters_schema_for<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::openapi3().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| empty_object_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
    }
    value
}

pub fn empty_object_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Sample {
        /// Required path
        path: String,
        /// Optional list
        items: Option<Vec<String>>,
    }

    #[test]
    fn test_schema_shape() {
        let schema = parameters_schema_for::<Sample>();
        assert_eq!(schema["type"], "object");
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["path"]["description"], "Required path");
        assert_eq!(schema["properties"]["items"]["type"], "array");
        assert_eq!(schema["properties"]["items"]["nullable"], true);
        assert_eq!(schema["required"], serde_json::json!(["path"]));
    }
}
