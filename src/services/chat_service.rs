// ==================== WATER QUALITY ASSISTANT ====================
// Keyword-routed answers about water safety. Each user message and the
// assistant reply are stored so the chat page can restore its history.

use crate::{
    database::Repository,
    models::{ChatMessage, ChatRole, WaterMetrics},
    services::water_quality::{self, Assessment},
    utils::error::AppError,
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const DEFAULT_HISTORY: usize = 50;
pub const MAX_HISTORY: usize = 200;

struct Topic {
    name: &'static str,
    keywords: &'static [&'static str],
    reply: &'static str,
    suggestions: &'static [&'static str],
}

lazy_static! {
    static ref TOPICS: Vec<Topic> = vec![
        Topic {
            name: "ph",
            keywords: &["ph", "acidic", "alkaline", "acidity", "alkalinity"],
            reply: "pH measures how acidic or alkaline water is. Drinking water should stay between 6.5 and 8.5. \
                    Low pH water can corrode pipes and leach metals such as lead and copper; high pH gives a bitter \
                    taste and scaling. A calibrated pH probe or test strips will tell you where you stand.",
            suggestions: &["How do I raise the pH of my water?", "Can low pH leach lead?"],
        },
        Topic {
            name: "tds",
            keywords: &["tds", "dissolved", "solids", "minerals", "salinity"],
            reply: "TDS (Total Dissolved Solids) is the amount of minerals, salts and metals dissolved in water, in mg/L. \
                    Below 300 mg/L is excellent, up to 500 mg/L is acceptable, and above 1000 mg/L is considered \
                    unsuitable for drinking. Reverse osmosis is the most effective way to reduce TDS.",
            suggestions: &["What TDS meter should I buy?", "Is very low TDS water safe?"],
        },
        Topic {
            name: "turbidity",
            keywords: &["turbidity", "ntu", "cloudy", "murky", "clarity", "sediment"],
            reply: "Turbidity describes how cloudy water is and is measured in NTU (Nephelometric Turbidity Units). \
                    Treated drinking water should be below 1 NTU; above 5 NTU the cloudiness is visible and can shield \
                    microbes from disinfection. Sediment filters and letting water settle both help.",
            suggestions: &["Why is my tap water cloudy?", "Does turbidity mean bacteria?"],
        },
        Topic {
            name: "chlorine",
            keywords: &["chlorine", "chlorinated", "chloramine", "bleach", "disinfectant"],
            reply: "Municipal water is disinfected with chlorine; a residual of 0.2 to 4.0 mg/L keeps it safe through the \
                    pipes. Below 0.2 mg/L disinfection may be inadequate, and above 4 mg/L taste and irritation become a \
                    concern. Activated carbon filters remove most chlorine taste.",
            suggestions: &["How do I remove chlorine taste?", "Is chloramine different from chlorine?"],
        },
        Topic {
            name: "lead",
            keywords: &["lead", "metal", "metals", "arsenic", "mercury", "copper", "heavy metal"],
            reply: "There is no safe level of lead exposure; the guideline limit is 0.01 mg/L. Lead usually comes from old \
                    pipes and solder. Run the tap for a minute before drinking, use only cold water for cooking, and use \
                    a filter certified for lead removal until a lab test confirms your water is clean.",
            suggestions: &["How do I test for lead?", "Which filters remove lead?"],
        },
        Topic {
            name: "bacteria",
            keywords: &["bacteria", "coli", "coliform", "microbe", "microbes", "pathogen", "virus", "parasite"],
            reply: "Microbial contamination such as E. coli or coliform bacteria is the most immediate health risk in \
                    drinking water. Any detectable E. coli means the water is unsafe. Boil water for at least one \
                    minute, and report the incident so others in the area are warned.",
            suggestions: &["How long should I boil water?", "How do I report contamination?"],
        },
        Topic {
            name: "nitrate",
            keywords: &["nitrate", "nitrates", "nitrite", "fertilizer", "agricultural"],
            reply: "Nitrates mostly come from fertilizers and septic systems. The guideline is 50 mg/L (as nitrate); \
                    infants are especially vulnerable. Boiling does not remove nitrates; use reverse osmosis or ion \
                    exchange treatment.",
            suggestions: &["Are nitrates dangerous for babies?", "Does boiling remove nitrates?"],
        },
        Topic {
            name: "hardness",
            keywords: &["hardness", "hard", "limescale", "scale", "calcium", "magnesium", "softener"],
            reply: "Hard water contains calcium and magnesium. It is not a health risk but causes limescale and reduces \
                    soap lather. Above 180 mg/L as CaCO3 is considered very hard; a water softener or descaler helps \
                    appliances last longer.",
            suggestions: &["Is hard water bad for health?", "How does a water softener work?"],
        },
        Topic {
            name: "boil",
            keywords: &["boil", "boiling", "advisory", "emergency", "drink"],
            reply: "Under a boil-water advisory, bring water to a rolling boil for at least one minute (three minutes above \
                    2000 m altitude), then let it cool. Boiling kills microbes but does not remove chemicals such as \
                    lead or nitrates.",
            suggestions: &["Does boiling remove lead?", "How do I check active alerts near me?"],
        },
        Topic {
            name: "filters",
            keywords: &["filter", "filters", "filtration", "purifier", "osmosis", "carbon", "treatment"],
            reply: "Choose a filter for the problem you have: activated carbon for chlorine taste and organics, reverse \
                    osmosis for TDS, nitrates and most metals, UV for microbes, and sediment filters for turbidity. \
                    Look for independent certification and replace cartridges on schedule.",
            suggestions: &["Which filter removes lead?", "How often should I replace a filter?"],
        },
        Topic {
            name: "sensors",
            keywords: &["sensor", "sensors", "meter", "probe", "monitor", "monitoring", "buy", "device"],
            reply: "The marketplace offers pH, TDS, turbidity, chlorine and multi-parameter sensors. For home use a TDS pen \
                    and a pH meter cover the basics; multi-parameter probes suit wells and community monitoring points. \
                    Readings you submit also update the public station map.",
            suggestions: &["Show me multi-parameter sensors", "How do I calibrate a pH probe?"],
        },
        Topic {
            name: "reporting",
            keywords: &["report", "reporting", "incident", "complaint", "smell", "odor", "taste", "color", "discolored"],
            reply: "If your water looks, smells or tastes unusual, file a community report with the location, what you \
                    noticed and its severity. Moderators review reports and nearby users can confirm them. In case of \
                    illness, contact your local health authority first.",
            suggestions: &["How do I file a report?", "What happens after I report?"],
        },
        Topic {
            name: "greeting",
            keywords: &["hello", "hi", "hey", "help", "start"],
            reply: "Hello! I can help you understand water quality: pH, TDS, turbidity, chlorine, lead, bacteria and more. \
                    You can also share sensor readings and I will assess them for you.",
            suggestions: &["What is a safe pH?", "What does TDS mean?", "Is my water safe to drink?"],
        },
    ];
}

const FALLBACK_REPLY: &str = "I'm not sure about that one. I can answer questions about pH, TDS, turbidity (NTU), chlorine, \
                              lead and heavy metals, bacteria, nitrates, water hardness, filters, sensors and incident \
                              reporting. You can also include readings for an assessment.";
const FALLBACK_SUGGESTIONS: &[&str] = &["What is a safe pH?", "What does TDS mean?", "How do I report contamination?"];

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub message: String,
    /// Optional readings to assess alongside the question
    pub context: Option<WaterMetrics>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssistantReply {
    pub topic: String,
    pub reply: String,
    pub suggestions: Vec<String>,
    pub assessment: Option<Assessment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message_id: String,
    pub reply: AssistantReply,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub success: bool,
    pub messages: Vec<ChatMessage>,
    pub count: usize,
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Picks the topic with the most keyword hits; earlier topics win ties
pub fn compose_reply(message: &str, context: Option<&WaterMetrics>) -> AssistantReply {
    let words = tokenize(message);
    let joined = words.join(" ");

    let best = TOPICS
        .iter()
        .map(|topic| {
            let hits = topic
                .keywords
                .iter()
                .filter(|kw| {
                    if kw.contains(' ') {
                        joined.contains(*kw)
                    } else {
                        words.iter().any(|w| w == *kw)
                    }
                })
                .count();
            (topic, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .fold(None::<(&Topic, usize)>, |best, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        });

    let (topic, mut reply, suggestions) = match best {
        Some((topic, _)) => (
            topic.name.to_string(),
            topic.reply.to_string(),
            topic.suggestions.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        ),
        None => (
            "general".to_string(),
            FALLBACK_REPLY.to_string(),
            FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        ),
    };

    let assessment = context.filter(|m| !m.is_empty()).map(water_quality::classify);
    if let Some(assessment) = &assessment {
        reply.push_str("\n\n");
        reply.push_str(&summarize(assessment));
    }

    AssistantReply {
        topic,
        reply,
        suggestions,
        assessment,
    }
}

fn summarize(assessment: &Assessment) -> String {
    let verdict = match assessment.status {
        crate::models::SafetyStatus::Safe => "Your readings are within safe drinking-water ranges.",
        crate::models::SafetyStatus::Caution => "Your readings need attention before drinking.",
        crate::models::SafetyStatus::Unsafe => "Your readings indicate the water is unsafe to drink.",
        crate::models::SafetyStatus::Unknown => "I could not assess these readings.",
    };
    if assessment.issues.is_empty() {
        verdict.to_string()
    } else {
        format!("{} Issues: {}.", verdict, assessment.issue_messages().join("; "))
    }
}

pub async fn send_message(
    repo: &dyn Repository,
    user_id: &str,
    request: SendMessageRequest,
    now: DateTime<Utc>,
) -> Result<SendMessageResponse, AppError> {
    let text = request.message.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let reply = compose_reply(text, request.context.as_ref());
    let at = now.timestamp_millis();

    repo.insert_chat_message(&ChatMessage {
        message_id: ObjectId::new().to_hex(),
        user_id: user_id.to_string(),
        role: ChatRole::User,
        content: text.to_string(),
        topic: Some(reply.topic.clone()),
        created_at: at,
    })
    .await?;

    let assistant_message = ChatMessage {
        message_id: ObjectId::new().to_hex(),
        user_id: user_id.to_string(),
        role: ChatRole::Assistant,
        content: reply.reply.clone(),
        topic: Some(reply.topic.clone()),
        // strictly after the question so history never ties
        created_at: at + 1,
    };
    repo.insert_chat_message(&assistant_message).await?;

    Ok(SendMessageResponse {
        success: true,
        message_id: assistant_message.message_id,
        reply,
    })
}

pub async fn history(repo: &dyn Repository, user_id: &str, limit: Option<usize>) -> Result<HistoryResponse, AppError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY);
    let messages = repo.chat_history(user_id, limit).await?;
    Ok(HistoryResponse {
        success: true,
        count: messages.len(),
        messages,
    })
}

pub async fn clear_history(repo: &dyn Repository, user_id: &str) -> Result<u64, AppError> {
    let deleted = repo.clear_chat_history(user_id).await?;
    log::info!("🧽 Cleared {} chat messages for {}", deleted, user_id);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::SafetyStatus;

    #[test]
    fn test_topic_routing() {
        assert_eq!(compose_reply("What is a good pH for drinking water?", None).topic, "ph");
        assert_eq!(compose_reply("my TDS meter says 650", None).topic, "tds");
        assert_eq!(compose_reply("Water looks cloudy, what NTU is ok?", None).topic, "turbidity");
        assert_eq!(compose_reply("Found E. coli in my well", None).topic, "bacteria");
        assert_eq!(compose_reply("quantum chromodynamics", None).topic, "general");
    }

    #[test]
    fn test_ph_keyword_is_a_whole_word() {
        // "phone" and "graph" must not trigger the pH topic
        assert_ne!(compose_reply("my phone shows a graph", None).topic, "ph");
    }

    #[test]
    fn test_context_is_assessed() {
        let readings = WaterMetrics {
            ph: Some(5.2),
            tds: Some(300.0),
            ..Default::default()
        };
        let reply = compose_reply("is my water safe to drink?", Some(&readings));
        let assessment = reply.assessment.unwrap();
        assert_eq!(assessment.status, SafetyStatus::Unsafe);
        assert!(reply.reply.contains("unsafe to drink"));
    }

    #[tokio::test]
    async fn test_history_keeps_both_sides() {
        let repo = MemoryStore::new();
        let now = Utc::now();
        let request = SendMessageRequest { message: "hello".into(), context: None };
        send_message(&repo, "u1", request, now).await.unwrap();

        let history = history(&repo, "u1", None).await.unwrap();
        assert_eq!(history.count, 2);
        assert_eq!(history.messages[0].role, ChatRole::User);
        assert_eq!(history.messages[1].role, ChatRole::Assistant);
        assert_eq!(history.messages[1].topic.as_deref(), Some("greeting"));

        let empty = SendMessageRequest { message: "   ".into(), context: None };
        assert!(matches!(send_message(&repo, "u1", empty, now).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_history_limit_keeps_latest_exchange_in_order() {
        let repo = MemoryStore::new();
        let first = Utc::now();
        let second = first + chrono::Duration::seconds(1);
        let ask = |text: &str| SendMessageRequest { message: text.into(), context: None };
        send_message(&repo, "u1", ask("hello"), first).await.unwrap();
        send_message(&repo, "u1", ask("what pH is safe?"), second).await.unwrap();

        let history = history(&repo, "u1", Some(2)).await.unwrap();
        assert_eq!(history.count, 2);
        assert_eq!(history.messages[0].role, ChatRole::User);
        assert_eq!(history.messages[0].content, "what pH is safe?");
        assert_eq!(history.messages[1].role, ChatRole::Assistant);
        assert!(history.messages[0].created_at < history.messages[1].created_at);
    }

    #[tokio::test]
    async fn test_history_orders_by_timestamp_not_insertion() {
        let repo = MemoryStore::new();
        for (id, created_at) in [("late", 2_000), ("early", 1_000)] {
            repo.insert_chat_message(&ChatMessage {
                message_id: id.to_string(),
                user_id: "u1".to_string(),
                role: ChatRole::User,
                content: id.to_string(),
                topic: None,
                created_at,
            })
            .await
            .unwrap();
        }

        let history = history(&repo, "u1", None).await.unwrap();
        let ids: Vec<&str> = history.messages.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, ["early", "late"]);
    }
}
