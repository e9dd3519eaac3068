//! Email prompt construction.
//!
//! Turns the structured draft fields (flow, tone, length, ...) into a system
//! and user message pair. The legacy single `prompt` string is still accepted
//! when the structured fields are incomplete.

use std::str::FromStr;

use serde::Deserialize;

/// Default system prompt used when a request supplies no structured fields.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise business email assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Reply,
    Compose,
    Rewrite,
    /// Proofreading pass; shares the rewrite template.
    Grammar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Friendly,
    Formal,
    Concise,
    Enthusiastic,
    Apologetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Short,
    Medium,
    Long,
}

/// Returned by the `FromStr` impls for unknown names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVariant;

impl FromStr for Flow {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reply" => Ok(Self::Reply),
            "compose" => Ok(Self::Compose),
            "rewrite" => Ok(Self::Rewrite),
            "grammar" => Ok(Self::Grammar),
            _ => Err(UnknownVariant),
        }
    }
}

impl FromStr for Tone {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "friendly" => Ok(Self::Friendly),
            "formal" => Ok(Self::Formal),
            "concise" => Ok(Self::Concise),
            "enthusiastic" => Ok(Self::Enthusiastic),
            "apologetic" => Ok(Self::Apologetic),
            _ => Err(UnknownVariant),
        }
    }
}

impl FromStr for Length {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(UnknownVariant),
        }
    }
}

impl Tone {
    const fn line(self) -> &'static str {
        match self {
            Self::Friendly => "Tone: friendly, warm, and professional.",
            Self::Formal => "Tone: formal, clear, and succinct.",
            Self::Concise => "Tone: concise and to-the-point.",
            Self::Enthusiastic => "Tone: positive and energetic, but still professional.",
            Self::Apologetic => "Tone: empathetic and apologetic without overpromising.",
            Self::Neutral => "Tone: neutral, straightforward, and professional.",
        }
    }
}

impl Length {
    const fn line(self) -> &'static str {
        match self {
            Self::Short => "Length: brief (3–6 sentences).",
            Self::Long => "Length: detailed (8–14 sentences), but avoid redundancy.",
            Self::Medium => "Length: medium (5–8 sentences).",
        }
    }
}

/// Structured arguments for [`build_email_prompts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPromptArgs {
    pub flow: Flow,
    pub tone: Tone,
    pub length: Length,
    pub subject: Option<String>,
    /// Original email, thread, or reference notes.
    pub context: Option<String>,
    /// What the user wants from this draft.
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub system: String,
    pub user: String,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

pub fn build_email_prompts(args: &EmailPromptArgs) -> BuiltPrompt {
    let subject = non_blank(args.subject.as_ref());
    let context = non_blank(args.context.as_ref());
    let instructions = non_blank(args.instructions.as_ref());

    let system = [
        DEFAULT_SYSTEM_PROMPT,
        "Write clear, polite, and action-oriented emails.",
        "Avoid hallucinating details. If context is ambiguous, use neutral phrasing.",
        "Never include placeholders like \"[NAME]\" unless present in the input.",
        args.tone.line(),
        args.length.line(),
    ]
    .join(" ");

    let lines: Vec<Option<String>> = match args.flow {
        Flow::Reply => vec![
            Some("Task: Draft a reply to the email thread below.".into()),
            subject.map(|s| format!("Subject: {s}")),
            instructions.map(|i| format!("Additional guidance: {i}")),
            Some("--- Thread start ---".into()),
            Some(context.unwrap_or("(no prior email provided)").into()),
            Some("--- Thread end ---".into()),
        ],
        Flow::Compose => vec![
            Some("Task: Compose a new email.".into()),
            subject.map(|s| format!("Subject: {s}")),
            instructions.map(|i| format!("What this email should cover: {i}")),
            context.map(|c| format!("\nReference notes:\n{c}")),
        ],
        Flow::Rewrite | Flow::Grammar => vec![
            Some("Task: Rewrite the email below to match the requested tone and length.".into()),
            subject.map(|s| format!("Keep subject (if relevant): {s}")),
            instructions.map(|i| format!("Rewrite guidance: {i}")),
            Some("--- Original start ---".into()),
            Some(context.unwrap_or("(no original text provided)").into()),
            Some("--- Original end ---".into()),
        ],
    };

    let user = lines.into_iter().flatten().collect::<Vec<_>>().join("\n");
    BuiltPrompt { system, user }
}

/// Raw draft fields as they arrive in a request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DraftFields {
    /// Legacy single prompt string.
    pub prompt: Option<String>,
    pub flow: Option<String>,
    pub tone: Option<String>,
    pub length: Option<String>,
    pub subject: Option<String>,
    pub context: Option<String>,
    pub instructions: Option<String>,
}

impl DraftFields {
    /// Structured arguments, when flow, tone and length are all valid.
    pub fn structured(&self) -> Option<EmailPromptArgs> {
        let flow = self.flow.as_deref()?.parse().ok()?;
        let tone = self.tone.as_deref()?.parse().ok()?;
        let length = self.length.as_deref()?.parse().ok()?;
        Some(EmailPromptArgs {
            flow,
            tone,
            length,
            subject: self.subject.clone(),
            context: self.context.clone(),
            instructions: self.instructions.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    /// Neither structured fields nor a legacy prompt were supplied.
    #[error("Provide `prompt` string or structured fields {{flow,tone,length,...}}.")]
    MissingFields,
}

/// The user message and optional system override for one draft request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftPrompt {
    pub user: String,
    /// `None` means the relay's default system prompt is used.
    pub system: Option<String>,
}

impl DraftPrompt {
    pub fn from_fields(fields: &DraftFields, system_prelude: Option<&str>) -> Result<Self, PromptError> {
        if let Some(args) = fields.structured() {
            let built = build_email_prompts(&args);
            let system = match system_prelude {
                Some(prelude) => format!("{prelude}\n\n{}", built.system),
                None => built.system,
            };
            return Ok(Self {
                user: built.user,
                system: Some(system),
            });
        }

        let legacy = fields
            .prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(PromptError::MissingFields)?;
        Ok(Self {
            user: legacy.to_string(),
            system: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(flow: Flow) -> EmailPromptArgs {
        EmailPromptArgs {
            flow,
            tone: Tone::Friendly,
            length: Length::Short,
            subject: Some("  Quarterly sync ".into()),
            context: None,
            instructions: Some("Propose Tuesday".into()),
        }
    }

    #[test]
    fn system_prompt_carries_tone_and_length() {
        let built = build_email_prompts(&args(Flow::Compose));
        assert!(built.system.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(built.system.contains("Tone: friendly"));
        assert!(built.system.ends_with("Length: brief (3–6 sentences)."));
    }

    #[test]
    fn reply_uses_placeholder_without_context() {
        let built = build_email_prompts(&args(Flow::Reply));
        assert_eq!(
            built.user,
            "Task: Draft a reply to the email thread below.\n\
             Subject: Quarterly sync\n\
             Additional guidance: Propose Tuesday\n\
             --- Thread start ---\n\
             (no prior email provided)\n\
             --- Thread end ---"
        );
    }

    #[test]
    fn compose_omits_absent_lines() {
        let mut a = args(Flow::Compose);
        a.subject = None;
        a.context = Some("Budget is approved".into());
        let built = build_email_prompts(&a);
        assert_eq!(
            built.user,
            "Task: Compose a new email.\n\
             What this email should cover: Propose Tuesday\n\
             \nReference notes:\nBudget is approved"
        );
    }

    #[test]
    fn rewrite_wraps_context_in_markers() {
        let mut a = args(Flow::Rewrite);
        a.length = Length::Long;
        a.instructions = None;
        a.context = Some("pls send the file".into());
        let built = build_email_prompts(&a);
        assert_eq!(
            built.user,
            "Task: Rewrite the email below to match the requested tone and length.\n\
             Keep subject (if relevant): Quarterly sync\n\
             --- Original start ---\n\
             pls send the file\n\
             --- Original end ---"
        );
        assert!(built.system.contains("Length: detailed (8–14 sentences)"));
    }

    #[test]
    fn grammar_shares_rewrite_template() {
        let rewrite = build_email_prompts(&args(Flow::Rewrite));
        let grammar = build_email_prompts(&args(Flow::Grammar));
        assert_eq!(rewrite, grammar);
    }

    #[test]
    fn structured_fields_win_over_legacy_prompt() {
        let fields = DraftFields {
            prompt: Some("legacy".into()),
            flow: Some(" REPLY ".into()),
            tone: Some("formal".into()),
            length: Some("long".into()),
            ..DraftFields::default()
        };
        let draft = DraftPrompt::from_fields(&fields, Some("Company: Acme")).unwrap();
        assert!(draft.user.starts_with("Task: Draft a reply"));
        assert!(draft.system.unwrap().starts_with("Company: Acme\n\nYou are a concise"));
    }

    #[test]
    fn incomplete_structured_fields_fall_back_to_prompt() {
        let fields = DraftFields {
            prompt: Some("Write to Bob".into()),
            flow: Some("reply".into()),
            tone: Some("sarcastic".into()),
            ..DraftFields::default()
        };
        let draft = DraftPrompt::from_fields(&fields, None).unwrap();
        assert_eq!(draft.user, "Write to Bob");
        assert_eq!(draft.system, None);
    }

    #[test]
    fn blank_prompt_is_missing_fields() {
        let fields = DraftFields {
            prompt: Some("   ".into()),
            ..DraftFields::default()
        };
        assert_eq!(
            DraftPrompt::from_fields(&fields, None),
            Err(PromptError::MissingFields)
        );
    }
}
