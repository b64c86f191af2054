//! Next-best-action planning for the follow-up autopilot
//!
//! Keyword rules over the lead's context decide an intent and a set of
//! objections; the plan itself is always SMS now, email now, and a prep
//! task two hours out.

use serde_json::{Map, Value, json};

use leadpilot_store::{Direction, Message};

use crate::types::{ActionKind, AutopilotPlan, FollowupState, PersonalizedMessages, PlannedAction};

pub const NO_CONTEXT: &str = "(no prior context)";

/// How many thread entries feed the context when nothing was ingested
pub const THREAD_CONTEXT_LIMIT: usize = 12;

const PREP_TASK: &str = "Prep ROI one-pager and claims SLA, tailored to objections.";

/// `[Prospect SMS] body` / `[Agent EMAIL subj=…] body`, one line per message
pub fn render_thread(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let who = match m.direction {
                Direction::Inbound => "Prospect",
                Direction::Outbound => "Agent",
            };
            let subj = m
                .subject
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| format!(" subj={s}"))
                .unwrap_or_default();
            format!("[{} {}{}] {}", who, m.channel.as_str().to_uppercase(), subj, m.body)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ingested text wins, then the rendered thread, then a placeholder
pub fn resolve_context(ingested: Option<String>, recent: &[Message]) -> String {
    if let Some(text) = ingested.filter(|t| !t.trim().is_empty()) {
        return text;
    }
    let rendered = render_thread(recent);
    if rendered.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        rendered
    }
}

pub fn detect_intent(context: &str) -> &'static str {
    let ctx = context.to_lowercase();
    if ctx.contains("ready") || ctx.contains("let's switch") || ctx.contains("let\u{2019}s switch") {
        "ready_to_switch"
    } else if ctx.contains("next month") || ctx.contains("maybe") {
        "considering"
    } else if ctx.contains("just browsing") {
        "just_browsing"
    } else {
        "unknown"
    }
}

pub fn detect_objections(context: &str) -> Vec<String> {
    let ctx = context.to_lowercase();
    let mut objections = Vec::new();
    if ctx.contains("price") || ctx.contains("too expensive") {
        objections.push("price".to_string());
    }
    if ctx.contains("claim") {
        objections.push("claims".to_string());
    }
    objections
}

pub fn analyze(context: &str) -> FollowupState {
    FollowupState {
        intent: detect_intent(context).to_string(),
        objections: detect_objections(context),
    }
}

/// `Detected intent='considering' with objections=['price']. Drafting next-best actions.`
pub fn reasoning(state: &FollowupState) -> String {
    let objections = state
        .objections
        .iter()
        .map(|o| format!("'{o}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Detected intent='{}' with objections=[{}]. Drafting next-best actions.",
        state.intent, objections
    )
}

/// Assemble the plan. `email_body` already carries the booking link.
pub fn build_plan(
    lead_id: i64,
    context: String,
    drafts: &PersonalizedMessages,
    email_body: &str,
    booking_url: Option<&str>,
) -> AutopilotPlan {
    let state = analyze(&context);

    let mut email_meta = meta(json!({"channel": "email"}));
    if let Some(url) = booking_url {
        email_meta.insert("calendly".to_string(), Value::String(url.to_string()));
    }

    let plan = vec![
        PlannedAction {
            action: ActionKind::Sms,
            when: "now".to_string(),
            body: Some(drafts.sms.clone()),
            subject: None,
            meta: Some(meta(json!({"channel": "sms"}))),
        },
        PlannedAction {
            action: ActionKind::Email,
            when: "now".to_string(),
            body: Some(email_body.to_string()),
            subject: Some(drafts.email.subject.clone()),
            meta: Some(email_meta),
        },
        PlannedAction {
            action: ActionKind::Task,
            when: "in_2h".to_string(),
            body: Some(PREP_TASK.to_string()),
            subject: None,
            meta: Some(meta(json!({"assignee": "agent", "priority": "high"}))),
        },
    ];

    AutopilotPlan {
        lead_id,
        reasoning: reasoning(&state),
        state,
        plan,
        used_context: context,
    }
}

fn meta(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EmailDraft;
    use chrono::Utc;
    use leadpilot_store::{Channel, MessageStatus};

    fn message(direction: Direction, channel: Channel, subject: Option<&str>, body: &str) -> Message {
        Message {
            id: 1,
            lead_id: 1,
            direction,
            channel,
            subject: subject.map(str::to_string),
            body: body.to_string(),
            provider_sid: None,
            status: MessageStatus::Received,
            created_at: Utc::now(),
        }
    }

    fn drafts() -> PersonalizedMessages {
        PersonalizedMessages {
            sms: "Hi Dana!".to_string(),
            email: EmailDraft {
                subject: "Insurance review for Acme".to_string(),
                body: "Hi Dana,".to_string(),
            },
            linkedin: String::new(),
            context_used: String::new(),
        }
    }

    #[test]
    fn test_detect_intent_precedence() {
        assert_eq!(detect_intent("We're READY, maybe next month"), "ready_to_switch");
        assert_eq!(detect_intent("let\u{2019}s switch"), "ready_to_switch");
        assert_eq!(detect_intent("let's switch carriers"), "ready_to_switch");
        assert_eq!(detect_intent("Maybe later"), "considering");
        assert_eq!(detect_intent("call me next month"), "considering");
        assert_eq!(detect_intent("just browsing thanks"), "just_browsing");
        assert_eq!(detect_intent(NO_CONTEXT), "unknown");
    }

    #[test]
    fn test_detect_objections() {
        assert_eq!(detect_objections("Too expensive and slow claims"), vec!["price", "claims"]);
        assert_eq!(detect_objections("what's the price?"), vec!["price"]);
        assert!(detect_objections("sounds good").is_empty());
    }

    #[test]
    fn test_reasoning_format() {
        let state = FollowupState {
            intent: "considering".to_string(),
            objections: vec!["price".to_string(), "claims".to_string()],
        };
        assert_eq!(
            reasoning(&state),
            "Detected intent='considering' with objections=['price', 'claims']. Drafting next-best actions."
        );
        assert!(reasoning(&FollowupState::default()).contains("objections=[]"));
    }

    #[test]
    fn test_render_thread() {
        let thread = vec![
            message(Direction::Inbound, Channel::Sms, None, "price is high"),
            message(Direction::Outbound, Channel::Email, Some("Quote"), "Here it is"),
        ];
        assert_eq!(
            render_thread(&thread),
            "[Prospect SMS] price is high\n[Agent EMAIL subj=Quote] Here it is"
        );
    }

    #[test]
    fn test_resolve_context_order() {
        let thread = vec![message(Direction::Inbound, Channel::Note, None, "hello")];
        assert_eq!(resolve_context(Some("pasted".to_string()), &thread), "pasted");
        assert_eq!(resolve_context(Some("  ".to_string()), &thread), "[Prospect NOTE] hello");
        assert_eq!(resolve_context(None, &[]), NO_CONTEXT);
    }

    #[test]
    fn test_build_plan_shape() {
        let plan = build_plan(
            3,
            "maybe next month, price concerns".to_string(),
            &drafts(),
            "Hi Dana,\n\nBook a time: https://cal.example\n",
            Some("https://cal.example"),
        );
        assert_eq!(plan.lead_id, 3);
        assert_eq!(plan.state.intent, "considering");
        assert_eq!(plan.state.objections, vec!["price"]);
        assert_eq!(plan.plan.len(), 3);

        assert_eq!(plan.plan[0].action, ActionKind::Sms);
        assert_eq!(plan.plan[0].body.as_deref(), Some("Hi Dana!"));

        let email = &plan.plan[1];
        assert_eq!(email.action, ActionKind::Email);
        assert_eq!(email.subject.as_deref(), Some("Insurance review for Acme"));
        assert_eq!(email.meta.as_ref().unwrap()["calendly"], "https://cal.example");

        let task = &plan.plan[2];
        assert_eq!(task.action, ActionKind::Task);
        assert_eq!(task.when, "in_2h");
        assert_eq!(task.meta.as_ref().unwrap()["priority"], "high");
        assert_eq!(plan.used_context, "maybe next month, price concerns");
    }

    #[test]
    fn test_build_plan_without_booking_url() {
        let plan = build_plan(1, NO_CONTEXT.to_string(), &drafts(), "Hi", None);
        let meta = plan.plan[1].meta.as_ref().unwrap();
        assert!(meta.get("calendly").is_none());
        assert_eq!(meta["channel"], "email");
    }
}
