//! Persona — who the agent is and what it stands for.
//!
//! The persona feeds three places: the generation stage's system prompt,
//! the alignment validator (core values) and the consistency validator
//! (identity, tone, style, voice and reference facts).

use serde::{Deserialize, Serialize};

/// The agent's persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// The agent's name
    #[serde(default = "default_name")]
    pub name: String,

    /// Free-form description of who the agent is
    #[serde(default)]
    pub description: String,

    /// Expected tone (e.g., "warm", "matter-of-fact")
    #[serde(default)]
    pub tone: String,

    /// Expected writing style (e.g., "concise, plain language")
    #[serde(default)]
    pub style: String,

    /// Grammatical voice the agent speaks in (e.g., "first person")
    #[serde(default)]
    pub voice: String,

    /// Values a response must not violate
    #[serde(default)]
    pub core_values: Vec<String>,

    /// Facts the agent holds to be true about itself and its user
    #[serde(default)]
    pub reference_facts: Vec<String>,
}

fn default_name() -> String {
    "Stratum".into()
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: "A helpful, honest assistant.".into(),
            tone: String::new(),
            style: String::new(),
            voice: String::new(),
            core_values: vec![],
            reference_facts: vec![],
        }
    }
}

impl Persona {
    /// Build the system prompt the persona speaks under.
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are {}. {}\n", self.name, self.description.trim());

        let traits: Vec<String> = [
            ("Tone", &self.tone),
            ("Style", &self.style),
            ("Voice", &self.voice),
        ]
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}: {v}"))
        .collect();
        if !traits.is_empty() {
            prompt.push_str(&format!("\n{}\n", traits.join("\n")));
        }

        if !self.core_values.is_empty() {
            prompt.push_str("\n## Core Values\n");
            for value in &self.core_values {
                prompt.push_str(&format!("- {value}\n"));
            }
        }

        if !self.reference_facts.is_empty() {
            prompt.push_str("\n## Known Facts\n");
            for fact in &self.reference_facts {
                prompt.push_str(&format!("- {fact}\n"));
            }
        }

        prompt
    }

    /// Render the identity attributes the consistency check compares against.
    pub fn render_profile(&self) -> String {
        format!(
            "Name: {}\nDescription: {}\nTone: {}\nStyle: {}\nVoice: {}",
            self.name,
            self.description,
            or_unspecified(&self.tone),
            or_unspecified(&self.style),
            or_unspecified(&self.voice),
        )
    }
}

fn or_unspecified(s: &str) -> &str {
    if s.is_empty() { "(unspecified)" } else { s }
}
