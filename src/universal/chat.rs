use super::types::{
    ChatChoice, ChatMessage, ChatResponseMetadata, ConversationEntry, Reasoning, ResponseFormat,
    Role, ToolDefinition, UniversalChatRequest, UniversalChatResponse, Usage,
};
use super::TranslationDriver;
use crate::config::GeminiConfig;
use crate::gemini::request::GeminiGenerateRequest;
use crate::gemini::response::GeminiGenerateResponse;
use crate::gemini::types::{
    Candidate, Content, FinishReason, FunctionCall, FunctionDeclaration, FunctionResponse,
    GeminiCallResult, GeminiRole, Part, Tool, UsageMetadata,
};
use crate::{Error, Result};
use chrono::Utc;
use uuid::Uuid;

const FALLBACK_MODEL: &str = "gemini-model";

/// Universal finish reason to Gemini. Anything unrecognized becomes `STOP`.
pub fn finish_reason_to_gemini(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::MaxTokens,
        Some("tool_calls") => FinishReason::FunctionCall,
        Some("content_filter") => FinishReason::Safety,
        _ => FinishReason::Stop,
    }
}

/// Gemini finish reason to universal. Unrecognized values pass through.
pub fn finish_reason_from_gemini(reason: &str) -> String {
    match reason {
        "STOP" | "OTHER" => "stop",
        "MAX_TOKENS" => "length",
        "SAFETY" | "RECITATION" | "LANGUAGE" => "content_filter",
        other => other,
    }
    .to_string()
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => GeminiRole::Model.as_str(),
        other => other.as_str(),
    }
}

fn universal_role(role: Option<&str>) -> Role {
    match role {
        Some("model") => Role::Model,
        Some("function") => Role::Function,
        _ => Role::User,
    }
}

/// Convert one conversation entry to a Gemini content.
///
/// Tool calls are spoken by the model; tool results go back as `user`.
pub fn entry_to_content(entry: &ConversationEntry) -> Content {
    match entry {
        ConversationEntry::Text { role, content } => {
            Content::text(Some(wire_role(*role)), content.clone())
        }
        ConversationEntry::ToolCall { tool, input } => Content {
            role: Some(GeminiRole::Model.as_str().to_string()),
            parts: vec![Part::FunctionCall {
                function_call: FunctionCall {
                    name: tool.clone(),
                    args: input.clone(),
                },
            }],
        },
        ConversationEntry::ToolResult { tool, result } => Content {
            role: Some(GeminiRole::User.as_str().to_string()),
            parts: vec![Part::FunctionResponse {
                function_response: FunctionResponse::new(tool.clone(), result.clone()),
            }],
        },
    }
}

/// Nest every tool under one `functionDeclarations` entry; `None` when empty.
pub fn tools_to_wire(tools: &[ToolDefinition]) -> Option<Vec<Tool>> {
    if tools.is_empty() {
        return None;
    }

    Some(vec![Tool {
        function_declarations: tools
            .iter()
            .map(|tool| FunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            })
            .collect(),
    }])
}

/// Entries recovered from one Gemini content, in part order. Adjacent text
/// parts merge into one text entry.
fn content_to_entries(content: &Content) -> Result<Vec<ConversationEntry>> {
    let role = universal_role(content.role.as_deref());
    let mut entries = Vec::new();
    let mut text = String::new();

    let flush = |text: &mut String, entries: &mut Vec<ConversationEntry>| {
        if !text.is_empty() {
            entries.push(ConversationEntry::Text {
                role,
                content: std::mem::take(text),
            });
        }
    };

    for part in &content.parts {
        match part {
            Part::Text { text: fragment, .. } => text.push_str(fragment),
            Part::FunctionCall { function_call } => {
                flush(&mut text, &mut entries);
                entries.push(ConversationEntry::ToolCall {
                    tool: function_call.name.clone(),
                    input: function_call.args.clone(),
                });
            }
            Part::FunctionResponse { function_response } => {
                flush(&mut text, &mut entries);
                let result = function_response
                    .response
                    .get("content")
                    .cloned()
                    .unwrap_or_else(|| function_response.response.clone());
                entries.push(ConversationEntry::ToolResult {
                    tool: function_response.name.clone(),
                    result,
                });
            }
            Part::InlineData { inline_data } => {
                return Err(Error::Translation(format!(
                    "inline {} data has no universal form",
                    inline_data.mime_type
                )))
            }
            Part::Other(fields) => {
                let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
                return Err(Error::Translation(format!(
                    "unsupported content part with fields [{}]",
                    keys.join(", ")
                )));
            }
        }
    }
    flush(&mut text, &mut entries);

    Ok(entries)
}

fn candidate_text(candidate: &Candidate) -> String {
    candidate
        .parts()
        .iter()
        .filter_map(Part::output_text)
        .collect()
}

/// Chat translation between the universal schema and `generateContent`.
#[derive(Debug, Clone, Default)]
pub struct GeminiChatDriver {
    config: GeminiConfig,
}

impl GeminiChatDriver {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }
}

impl TranslationDriver for GeminiChatDriver {
    type UniversalRequest = UniversalChatRequest;
    type UniversalResponse = UniversalChatResponse;
    type WireRequest = GeminiGenerateRequest;
    type WireResponse = GeminiGenerateResponse;

    fn to_wire(&self, request: UniversalChatRequest) -> Result<GeminiGenerateRequest> {
        let contents = request.messages.iter().map(entry_to_content).collect();
        let mut wire = GeminiGenerateRequest::new(&self.config, request.model, contents);

        if !request.system_instructions.is_empty() {
            wire = wire.with_system_prompt(request.system_instructions.join("\n\n"));
        }
        if let Some(tools) = tools_to_wire(&request.tools) {
            wire = wire.with_tools(tools);
        }
        if let Some(temperature) = request.temperature {
            wire = wire.with_temperature(temperature);
        }
        if let Some(top_p) = request.top_p {
            wire = wire.with_top_p(top_p);
        }
        if let Some(top_k) = request.top_k {
            wire = wire.with_top_k(top_k);
        }
        if let Some(stop) = request.stop {
            wire = wire.with_stop_sequences(stop);
        }
        if let Some(max_tokens) = request.max_tokens {
            wire = wire.with_max_output_tokens(max_tokens);
        }
        if let Some(reasoning) = request.reasoning {
            if let Some(budget) = reasoning.budget {
                wire = wire.with_thinking_budget(budget);
            }
            if let Some(include_thoughts) = reasoning.include_thoughts {
                wire = wire.with_include_thoughts(include_thoughts);
            }
        }
        if let Some(format) = request.response_format {
            wire = wire.with_response_mime_type(format.format_type);
            if let Some(schema) = format.schema {
                wire = wire.with_response_schema(schema);
            }
        }

        Ok(wire)
    }

    fn from_wire(&self, response: GeminiGenerateResponse) -> Result<UniversalChatResponse> {
        let choices: Vec<ChatChoice> = response
            .candidates()
            .iter()
            .enumerate()
            .map(|(index, candidate)| ChatChoice {
                index: index as u32,
                message: ChatMessage {
                    role: candidate
                        .content
                        .as_ref()
                        .and_then(|content| content.role.clone())
                        .unwrap_or_else(|| GeminiRole::Model.as_str().to_string()),
                    content: candidate_text(candidate),
                },
                finish_reason: candidate
                    .finish_reason
                    .as_deref()
                    .map(finish_reason_from_gemini),
            })
            .collect();

        let finish_reason = choices.first().and_then(|choice| choice.finish_reason.clone());
        let model_version = response.model_version().map(str::to_string);

        Ok(UniversalChatResponse {
            id: format!("gemini_{}", Uuid::new_v4().simple()),
            model: model_version
                .clone()
                .unwrap_or_else(|| FALLBACK_MODEL.to_string()),
            created: Utc::now().timestamp(),
            usage: Usage {
                prompt_tokens: response.input_tokens(),
                completion_tokens: response.output_tokens(),
                total_tokens: response.total_tokens(),
            },
            finish_reason,
            object: "chat.completion".to_string(),
            system_fingerprint: None,
            metadata: ChatResponseMetadata {
                model_version,
                safety_ratings: response
                    .primary_candidate()
                    .map(|candidate| candidate.safety_ratings.clone()),
            },
            choices,
        })
    }

    fn to_universal(&self, request: GeminiGenerateRequest) -> Result<UniversalChatRequest> {
        let mut messages = Vec::new();
        for content in request.contents() {
            messages.extend(content_to_entries(content)?);
        }

        let system_instructions = request
            .system_instruction()
            .map(|instruction| {
                instruction
                    .parts
                    .iter()
                    .filter_map(Part::text_value)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .into_iter()
            .collect();

        let tools = request
            .tools()
            .unwrap_or_default()
            .iter()
            .flat_map(|tool| &tool.function_declarations)
            .map(|declaration| ToolDefinition {
                name: declaration.name.clone(),
                description: declaration.description.clone(),
                input_schema: declaration.parameters.clone(),
            })
            .collect();

        let generation = request.generation_config().unwrap_or_default();
        let reasoning = generation
            .thinking_config
            .filter(|thinking| {
                thinking.thinking_budget.is_some() || thinking.include_thoughts.is_some()
            })
            .map(|thinking| Reasoning {
                budget: thinking.thinking_budget,
                include_thoughts: thinking.include_thoughts,
            });
        let response_format = (generation.response_mime_type.is_some()
            || generation.response_schema.is_some())
        .then(|| ResponseFormat {
            format_type: generation.response_mime_type.clone().unwrap_or_default(),
            schema: generation.response_schema.clone(),
        });

        Ok(UniversalChatRequest {
            model: request.model().to_string(),
            messages,
            system_instructions,
            tools,
            max_tokens: generation.max_output_tokens,
            temperature: generation.temperature,
            tool_choice: None,
            response_format,
            stream: false,
            parallel_function_calling: None,
            top_p: generation.top_p,
            top_k: generation.top_k,
            frequency_penalty: None,
            presence_penalty: None,
            stop: generation.stop_sequences,
            reasoning,
        })
    }

    fn from_universal(&self, response: UniversalChatResponse) -> Result<GeminiGenerateResponse> {
        let fallback_reason = response.finish_reason.as_deref();
        let candidates = response
            .choices
            .iter()
            .map(|choice| Candidate {
                content: Some(Content::text(
                    Some(GeminiRole::Model.as_str()),
                    choice.message.content.clone(),
                )),
                finish_reason: Some(
                    finish_reason_to_gemini(choice.finish_reason.as_deref().or(fallback_reason))
                        .to_string(),
                ),
                index: Some(choice.index),
                safety_ratings: Vec::new(),
                citation_metadata: None,
            })
            .collect();

        Ok(GeminiGenerateResponse::new(GeminiCallResult {
            candidates,
            usage_metadata: UsageMetadata {
                prompt_token_count: Some(response.usage.prompt_tokens),
                candidates_token_count: Some(response.usage.completion_tokens),
                total_token_count: Some(response.usage.total_tokens),
                ..Default::default()
            },
            model_version: Some(response.model),
            response_id: None,
            prompt_feedback: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn driver() -> GeminiChatDriver {
        GeminiChatDriver::new(GeminiConfig::new("k"))
    }

    fn wire_body(request: &GeminiGenerateRequest) -> serde_json::Value {
        serde_json::to_value(request.to_body()).unwrap()
    }

    #[test]
    fn test_finish_reason_forward_table() {
        for (universal, gemini) in [
            (Some("stop"), FinishReason::Stop),
            (Some("length"), FinishReason::MaxTokens),
            (Some("tool_calls"), FinishReason::FunctionCall),
            (Some("content_filter"), FinishReason::Safety),
            (Some("something_else"), FinishReason::Stop),
            (None, FinishReason::Stop),
        ] {
            assert_eq!(finish_reason_to_gemini(universal), gemini, "{:?}", universal);
        }
    }

    #[test]
    fn test_finish_reason_reverse_table() {
        for (gemini, universal) in [
            ("STOP", "stop"),
            ("MAX_TOKENS", "length"),
            ("SAFETY", "content_filter"),
            ("RECITATION", "content_filter"),
            ("LANGUAGE", "content_filter"),
            ("OTHER", "stop"),
            ("BLOCKLIST", "BLOCKLIST"),
        ] {
            assert_eq!(finish_reason_from_gemini(gemini), universal);
        }
    }

    #[test]
    fn test_assistant_role_becomes_model_and_never_comes_back() {
        let request = UniversalChatRequest::new(
            "gemini-2.5-flash",
            vec![
                ConversationEntry::user("hi"),
                ConversationEntry::assistant("hello"),
            ],
        );

        let wire = driver().to_wire(request).unwrap();
        let roles: Vec<_> = wire
            .contents()
            .iter()
            .map(|content| content.role.as_deref())
            .collect();
        assert_eq!(roles, vec![Some("user"), Some("model")]);

        let back = driver().to_universal(wire).unwrap();
        assert_eq!(back.messages[1], ConversationEntry::text(Role::Model, "hello"));
    }

    #[test]
    fn test_tool_reshape() {
        let mut request = UniversalChatRequest::new("m", vec![ConversationEntry::user("hi")]);
        request.tools = (0..3)
            .map(|i| {
                ToolDefinition::new(
                    format!("tool_{}", i),
                    format!("does {}", i),
                    json!({"type": "object", "properties": {"n": {"type": "integer"}}}),
                )
            })
            .collect();

        let body = wire_body(&driver().to_wire(request).unwrap());
        let declarations = body["tools"][0]["functionDeclarations"].as_array().unwrap();

        assert_eq!(body["tools"].as_array().map(Vec::len), Some(1));
        assert_eq!(declarations.len(), 3);
        assert_eq!(declarations[2]["name"], json!("tool_2"));
        assert_eq!(declarations[2]["description"], json!("does 2"));
        assert_eq!(declarations[2]["parameters"]["type"], json!("object"));
    }

    #[test]
    fn test_system_instructions_joined() {
        let mut request = UniversalChatRequest::new("m", vec![ConversationEntry::user("hi")]);
        request.system_instructions = vec!["Be brief.".to_string(), "Be kind.".to_string()];

        let body = wire_body(&driver().to_wire(request).unwrap());
        assert_eq!(
            body["systemInstruction"],
            json!({"parts": [{"text": "Be brief.\n\nBe kind."}]})
        );
    }

    #[test]
    fn test_empty_optional_sections_are_absent() {
        let request = UniversalChatRequest::new("m", vec![ConversationEntry::user("hi")]);
        let body = wire_body(&driver().to_wire(request).unwrap());

        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_generation_fields_and_dropped_fields() {
        let mut request = UniversalChatRequest::new("m", vec![ConversationEntry::user("hi")]);
        request.max_tokens = Some(256);
        request.top_p = Some(0.9);
        request.top_k = Some(40);
        request.stop = Some(vec!["END".to_string()]);
        request.reasoning = Some(Reasoning {
            budget: Some(512),
            include_thoughts: None,
        });
        request.response_format = Some(ResponseFormat {
            format_type: "application/json".to_string(),
            schema: Some(json!({"type": "object"})),
        });
        request.frequency_penalty = Some(0.5);
        request.presence_penalty = Some(0.5);
        request.tool_choice = Some(json!("auto"));

        let body = wire_body(&driver().to_wire(request).unwrap());

        assert_eq!(
            body["generationConfig"],
            json!({
                "topP": 0.9,
                "topK": 40,
                "stopSequences": ["END"],
                "maxOutputTokens": 256,
                "responseMimeType": "application/json",
                "responseSchema": {"type": "object"},
                "thinkingConfig": {"thinkingBudget": 512}
            })
        );
    }

    #[test]
    fn test_tool_entries_become_function_parts() {
        let request = UniversalChatRequest::new(
            "m",
            vec![
                ConversationEntry::ToolCall {
                    tool: "lights".to_string(),
                    input: json!({"on": false}),
                },
                ConversationEntry::ToolResult {
                    tool: "lights".to_string(),
                    result: json!("ok"),
                },
            ],
        );

        let wire = driver().to_wire(request.clone()).unwrap();
        let body = wire_body(&wire);
        assert_eq!(
            body["contents"],
            json!([
                {"role": "model", "parts": [{"functionCall": {"name": "lights", "args": {"on": false}}}]},
                {"role": "user", "parts": [{"functionResponse": {
                    "name": "lights",
                    "response": {"name": "lights", "content": "ok"}
                }}]}
            ])
        );

        let back = driver().to_universal(wire).unwrap();
        assert_eq!(back.messages, request.messages);
    }

    #[test]
    fn test_mixed_parts_keep_part_order() {
        let wire = GeminiGenerateRequest::new(
            &GeminiConfig::new("k"),
            "m",
            vec![Content {
                role: Some("model".to_string()),
                parts: vec![
                    Part::text("Checking. "),
                    Part::FunctionCall {
                        function_call: FunctionCall {
                            name: "lights".to_string(),
                            args: json!({"on": false}),
                        },
                    },
                    Part::text("Done"),
                    Part::text("."),
                ],
            }],
        );

        let back = driver().to_universal(wire).unwrap();

        assert_eq!(
            back.messages,
            vec![
                ConversationEntry::text(Role::Model, "Checking. "),
                ConversationEntry::ToolCall {
                    tool: "lights".to_string(),
                    input: json!({"on": false}),
                },
                ConversationEntry::text(Role::Model, "Done."),
            ]
        );
    }

    #[test]
    fn test_system_and_function_roles_pass_through() {
        let request = UniversalChatRequest::new(
            "m",
            vec![
                ConversationEntry::text(Role::System, "rules"),
                ConversationEntry::text(Role::Function, "output"),
                ConversationEntry::text(Role::Model, "reply"),
            ],
        );

        let wire = driver().to_wire(request).unwrap();
        let roles: Vec<_> = wire
            .contents()
            .iter()
            .map(|content| content.role.as_deref())
            .collect();

        assert_eq!(roles, vec![Some("system"), Some("function"), Some("model")]);
    }

    #[test]
    fn test_lossy_round_trip() {
        let mut request = UniversalChatRequest::new(
            "gemini-2.5-flash",
            vec![
                ConversationEntry::user("What is Rust?"),
                ConversationEntry::text(Role::Model, "A language."),
                ConversationEntry::user("Thanks"),
            ],
        );
        request.temperature = Some(0.3);
        request.max_tokens = Some(100);
        request.frequency_penalty = Some(1.0);
        request.parallel_function_calling = Some(true);

        let back = driver()
            .to_universal(driver().to_wire(request.clone()).unwrap())
            .unwrap();

        assert_eq!(back.model, request.model);
        assert_eq!(back.messages, request.messages);
        assert_eq!(back.temperature, Some(0.3));
        assert_eq!(back.max_tokens, Some(100));
        assert_eq!(back.frequency_penalty, None);
        assert_eq!(back.presence_penalty, None);
        assert_eq!(back.parallel_function_calling, None);
        assert_eq!(back.tool_choice, None);
        assert!(!back.stream);
    }

    #[test]
    fn test_inline_data_has_no_universal_form() {
        let wire = GeminiGenerateRequest::new(
            &GeminiConfig::new("k"),
            "m",
            vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::InlineData {
                    inline_data: crate::gemini::types::InlineData {
                        mime_type: "image/png".to_string(),
                        data: "AAAA".to_string(),
                    },
                }],
            }],
        );

        let err = driver().to_universal(wire).unwrap_err();
        assert!(matches!(err, Error::Translation(_)));
    }

    #[test]
    fn test_from_wire() {
        let response = GeminiGenerateResponse::from_json(json!({
            "candidates": [
                {
                    "content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo"}, {"text": "hmm", "thought": true}]},
                    "finishReason": "MAX_TOKENS",
                    "safetyRatings": [{"category": "HARM_CATEGORY_HARASSMENT", "probability": "LOW"}]
                },
                {"content": {"parts": [{"text": "Hi"}]}, "finishReason": "RECITATION"}
            ],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10},
            "modelVersion": "gemini-2.5-flash-001"
        }))
        .unwrap();

        let universal = driver().from_wire(response).unwrap();

        assert!(universal.id.starts_with("gemini_"));
        assert_eq!(universal.model, "gemini-2.5-flash-001");
        assert_eq!(universal.object, "chat.completion");
        assert_eq!(universal.choices.len(), 2);
        assert_eq!(universal.choices[0].message.content, "Hello");
        assert_eq!(universal.choices[0].finish_reason.as_deref(), Some("length"));
        assert_eq!(universal.choices[1].message.role, "model");
        assert_eq!(universal.choices[1].finish_reason.as_deref(), Some("content_filter"));
        assert_eq!(universal.finish_reason.as_deref(), Some("length"));
        assert_eq!(
            universal.usage,
            Usage {
                prompt_tokens: 4,
                completion_tokens: 6,
                total_tokens: 10
            }
        );
        assert_eq!(universal.metadata.safety_ratings.map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_from_wire_defaults() {
        let universal = driver()
            .from_wire(GeminiGenerateResponse::from_json(json!({})).unwrap())
            .unwrap();

        assert_eq!(universal.model, "gemini-model");
        assert!(universal.choices.is_empty());
        assert_eq!(universal.finish_reason, None);
        assert_eq!(universal.usage, Usage::default());
    }

    #[test]
    fn test_from_universal() {
        let universal = UniversalChatResponse {
            id: "x".to_string(),
            model: "gemini-2.5-pro".to_string(),
            created: 0,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: "done".to_string(),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: Usage {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
            },
            finish_reason: None,
            object: "chat.completion".to_string(),
            system_fingerprint: None,
            metadata: Default::default(),
        };

        let response = driver().from_universal(universal).unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.text_content(), Some("done"));
        assert_eq!(response.finish_reason(), Some("FUNCTION_CALL"));
        assert_eq!(response.total_tokens(), 3);
        assert_eq!(response.model_version(), Some("gemini-2.5-pro"));
    }
}
