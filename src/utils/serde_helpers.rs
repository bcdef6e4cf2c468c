/// 用于处理 SurrealDB Thing ID 的反序列化辅助模块

use serde::{Deserialize, Deserializer};

/// 接受纯字符串 ID 或 SurrealDB 的 Thing (例如: `post:xxxxx`)，始终返回不带表前缀的 ID
pub mod thing_id {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdValue {
            String(String),
            Thing {
                #[allow(dead_code)]
                tb: String,
                id: serde_json::Value,
            },
        }

        match IdValue::deserialize(deserializer)? {
            IdValue::String(s) => Ok(strip_table(&s).to_string()),
            IdValue::Thing { id, .. } => Ok(raw_id(&id)),
        }
    }

    fn strip_table(id: &str) -> &str {
        let bare = match id.split_once(':') {
            Some((_, rest)) => rest,
            None => id,
        };
        bare.trim_start_matches('⟨')
            .trim_end_matches('⟩')
            .trim_matches('`')
    }

    fn raw_id(id: &serde_json::Value) -> String {
        match id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            // Id enum serialized externally tagged, e.g. {"String": "abc"}
            serde_json::Value::Object(map) => map
                .values()
                .next()
                .map(raw_id)
                .unwrap_or_default(),
            other => other.to_string(),
        }
    }
}
