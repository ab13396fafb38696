//! Scripted weather assistant.
//!
//! Replies come from a fixed, ordered list of keyword rules applied to the
//! current snapshot. Nothing is learned and nothing leaves the process.

use std::time::Duration;

use crate::model::{WeatherSnapshot, round_half_up};

/// Pause the chat front end shows before an assistant reply.
pub const REPLY_DELAY: Duration = Duration::from_millis(1500);

const UNKNOWN_PLACE: &str = "your location";

/// Values a rule can refer to, with the same defaults when no snapshot is held.
struct Facts<'a> {
    temp: i64,
    description: &'a str,
    place: &'a str,
    pressure: Option<u32>,
}

impl<'a> Facts<'a> {
    fn of(snapshot: Option<&'a WeatherSnapshot>) -> Self {
        match snapshot {
            Some(s) => Self {
                temp: round_half_up(s.temperature_c),
                description: s.condition.description.as_str(),
                place: s.name.as_str(),
                pressure: Some(s.pressure_hpa),
            },
            None => Self { temp: 0, description: "unknown", place: UNKNOWN_PLACE, pressure: None },
        }
    }
}

type Rule = (&'static [&'static str], fn(&Facts<'_>) -> String);

const RULES: &[Rule] = &[
    (&["weather", "temperature"], conditions_reply),
    (&["wear", "clothes"], clothing_reply),
    (&["recommend", "suggestion"], activity_reply),
];

/// Reply to `input` given the current snapshot.
pub fn respond(input: &str, snapshot: Option<&WeatherSnapshot>) -> String {
    let lower = input.to_lowercase();
    let facts = Facts::of(snapshot);

    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, reply)| reply(&facts))
        .unwrap_or_else(|| {
            format!(
                "As your AI assistant, I'm analyzing the real-time data for {}. You can ask me \
                 about clothing recommendations, activity suggestions, or detailed atmospheric stats!",
                facts.place
            )
        })
}

/// Opening line of a conversation.
pub fn greeting(snapshot: Option<&WeatherSnapshot>) -> String {
    let place = snapshot.map(|s| s.name.as_str()).unwrap_or(UNKNOWN_PLACE);
    format!(
        "Hello! I'm SkyCast AI. I've analyzed the conditions in {place}. How can I assist your day?"
    )
}

fn conditions_reply(facts: &Facts<'_>) -> String {
    let pressure = facts.pressure.map_or_else(|| "unknown".to_string(), |p| p.to_string());
    format!(
        "Currently, it is {}°C and {} in {}. The atmospheric pressure is {} hPa, making it a stable day.",
        facts.temp, facts.description, facts.place, pressure
    )
}

fn clothing_reply(facts: &Facts<'_>) -> String {
    let reply = if facts.temp < 15 {
        "It's quite chilly! I'd recommend a warm jacket or coat, and perhaps a scarf if you're heading out late."
    } else if facts.temp < 25 {
        "The weather is pleasant. A t-shirt and light layering should keep you comfortable all day."
    } else {
        "It's quite warm! I'd suggest light linen or cotton clothing to stay cool."
    };
    reply.to_string()
}

fn activity_reply(facts: &Facts<'_>) -> String {
    let reply = if facts.description.contains("rain") {
        "Since it's raining, it's a perfect day for indoor activities like reading, visiting a gallery, or enjoying a cozy café."
    } else if facts.description.contains("clear") {
        "With clear skies, it's a fantastic day for a hike, a picnic, or some outdoor photography."
    } else {
        "It's a decent day for a mix of activities. Maybe a short walk and then a nice lunch indoors?"
    };
    reply.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
}

/// Chat log, opened with a greeting.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    next_id: u64,
}

impl Conversation {
    pub fn new(snapshot: Option<&WeatherSnapshot>) -> Self {
        let mut conversation = Self { messages: Vec::new(), next_id: 1 };
        conversation.push(Sender::Assistant, greeting(snapshot));
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Record the user's message and the reply. Blank input is ignored.
    pub fn send(&mut self, input: &str, snapshot: Option<&WeatherSnapshot>) -> Option<&Message> {
        if input.trim().is_empty() {
            return None;
        }

        self.push(Sender::User, input.to_string());
        let reply = respond(input, snapshot);
        self.push(Sender::Assistant, reply);
        self.messages.last()
    }

    fn push(&mut self, sender: Sender, text: String) {
        self.messages.push(Message { id: self.next_id, sender, text });
        self.next_id += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Condition;

    fn snapshot(temp: f64, description: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            name: "Lisbon".into(),
            country: "PT".into(),
            temperature_c: temp,
            feels_like_c: temp,
            temp_min_c: temp,
            temp_max_c: temp,
            humidity_pct: 60,
            pressure_hpa: 1018,
            wind_speed: 2.0,
            visibility_m: Some(10_000),
            sunrise: 0,
            sunset: 0,
            condition: Condition { code: 800, description: description.into() },
        }
    }

    #[test]
    fn conditions_rule_reports_snapshot() {
        let s = snapshot(21.6, "clear sky");
        assert_eq!(
            respond("What's the WEATHER like?", Some(&s)),
            "Currently, it is 22°C and clear sky in Lisbon. The atmospheric pressure is 1018 hPa, making it a stable day."
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let s = snapshot(5.0, "light rain");
        // Mentions both temperature and clothes; the conditions rule is first.
        assert!(respond("temperature and clothes?", Some(&s)).starts_with("Currently"));
    }

    #[test]
    fn clothing_thresholds() {
        assert!(respond("what to wear", Some(&snapshot(14.4, "mist"))).contains("warm jacket"));
        assert!(respond("what to wear", Some(&snapshot(14.5, "mist"))).contains("t-shirt"));
        assert!(respond("clothes", Some(&snapshot(24.4, "mist"))).contains("t-shirt"));
        assert!(respond("clothes", Some(&snapshot(25.0, "mist"))).contains("linen"));
    }

    #[test]
    fn activity_follows_description() {
        assert!(respond("any recommendation?", Some(&snapshot(18.0, "moderate rain"))).contains("indoor"));
        assert!(respond("suggestion", Some(&snapshot(18.0, "clear sky"))).contains("hike"));
        assert!(respond("suggestion", Some(&snapshot(18.0, "overcast clouds"))).contains("mix"));
    }

    #[test]
    fn fallback_reply_names_place() {
        let reply = respond("hello there", Some(&snapshot(18.0, "clear sky")));
        assert!(reply.contains("real-time data for Lisbon"));
    }

    #[test]
    fn no_snapshot_uses_defaults() {
        assert!(respond("weather", None).contains("0°C and unknown in your location"));
        assert!(respond("clothes", None).contains("chilly"));
        assert!(greeting(None).contains("your location"));
    }

    #[test]
    fn conversation_logs_both_sides() {
        let s = snapshot(10.0, "clear sky");
        let mut chat = Conversation::new(Some(&s));
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].sender, Sender::Assistant);

        assert!(chat.send("   ", Some(&s)).is_none());
        assert_eq!(chat.messages().len(), 1);

        let reply = chat.send("what should I wear?", Some(&s)).cloned().unwrap();
        assert_eq!(reply.sender, Sender::Assistant);
        assert!(reply.text.contains("chilly"));

        let ids: Vec<u64> = chat.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
