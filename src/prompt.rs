use crate::{
    chat::ChatMessage,
    config::Config,
    error::{Error, Result},
    template_validator::{TemplateKind, TemplateValidator},
    topics::DocumentTopics,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tera::{Context, Tera};

const SYSTEM: &str = "system";
const HUMAN: &str = "human";
const EXAMPLE: &str = "example";

/// An input context paired with the topics the model should answer with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    /// Example context text
    pub context: String,
    /// Expected answer
    pub output: DocumentTopics,
}

impl FewShotExample {
    /// Creates an example.
    #[must_use]
    pub fn new(context: impl Into<String>, output: DocumentTopics) -> Self {
        Self {
            context: context.into(),
            output,
        }
    }
}

static DEFAULT_EXAMPLES: Lazy<Vec<FewShotExample>> = Lazy::new(|| {
    vec![
        FewShotExample {
            context: "Photosynthesis in plants involves converting light energy into chemical \
                energy, using chlorophyll and other pigments to absorb light. This process is \
                crucial for plant growth and the production of oxygen."
                .to_string(),
            output: DocumentTopics {
                topics: vec![
                    "The process of photosynthesis in plants, including the conversion of light \
                        energy into chemical energy."
                        .to_string(),
                    "The role of chlorophyll and other pigments in absorbing light, crucial for \
                        plant growth and oxygen production."
                        .to_string(),
                ],
            },
        },
        FewShotExample {
            context: "De leeuw is een grote katachtige met een brede kop, een korte snuit en \
                relatief kleine, ronde oren. Hij heeft een kortharige asgrijze of zandgele vacht \
                (maar variërend van okerbruin tot bijna wit) en een donker kwastje aan het puntje \
                van de staart. Over de vacht verspreid liggen vage vlekken, die vooral bij jongere \
                dieren goed te zien zijn. De vlekken vervagen naarmate het dier ouder wordt en \
                zullen meestal uiteindelijk verdwijnen. De meeste mannetjes hebben dichte zwarte, \
                bruine of gele manen met een variërende lengte op de kop, hals en schouders. Bij \
                de nu uitgestorven ondersoorten uit Noord-Afrika en de Kaap liep de maan als een \
                franje over de buik. Het duurt meestal een jaar of zes eer de maan goed \
                ontwikkeld is. Wijfjes zijn kleiner en hebben geen manen."
                .to_string(),
            output: DocumentTopics {
                topics: vec![
                    "Fysieke kenmerken van leeuwen, inclusief hun grootte, vachtkleur en \
                        onderscheidende kenmerken zoals de manen en de staart."
                        .to_string(),
                    "Veranderingen in hun uiterlijk gerelateerd aan leeftijd, specifiek de \
                        ontwikkeling en het vervagen van vlekken en de groei van de manen bij \
                        mannetjes."
                        .to_string(),
                    "De vacht van de leeuw.".to_string(),
                    "Beschrijving van de manen van de leeuw.".to_string(),
                ],
            },
        },
    ]
});

/// The built-in few-shot examples.
#[must_use]
pub fn default_examples() -> Vec<FewShotExample> {
    DEFAULT_EXAMPLES.clone()
}

#[derive(Serialize)]
struct TemplateContext<'a> {
    input: &'a str,
    language: &'a str,
    custom: &'a HashMap<String, serde_json::Value>,
}

/// Chat prompt for topic extraction: a system message, few-shot
/// human/assistant pairs, then the human message carrying the chunk.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    tera: Tera,
    language: String,
    examples: Vec<FewShotExample>,
    custom_data: HashMap<String, serde_json::Value>,
}

impl PromptTemplate {
    /// Creates the default topic generation prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to compile.
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        for (name, source) in [
            (SYSTEM, include_str!("../templates/system.tera")),
            (HUMAN, include_str!("../templates/human.tera")),
            (EXAMPLE, include_str!("../templates/example.tera")),
        ] {
            tera.add_raw_template(name, source)
                .map_err(|e| Error::template(name, e))?;
        }

        Ok(Self {
            tera,
            language: Config::default().language,
            examples: default_examples(),
            custom_data: HashMap::new(),
        })
    }

    /// Creates a prompt from configuration, loading external templates.
    ///
    /// # Errors
    ///
    /// Returns an error if an external template cannot be read or is
    /// invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut prompt = Self::new()?
            .language(config.language.clone())
            .custom_data(config.custom_data.clone());

        if let Some(ref examples) = config.examples {
            prompt = prompt.examples(examples.clone());
        }

        if let Some(ref path) = config.system_template_path {
            prompt = prompt.system_template(&read_template(path)?)?;
        }

        if let Some(ref path) = config.human_template_path {
            prompt = prompt.human_template(&read_template(path)?)?;
        }

        Ok(prompt)
    }

    /// Sets the language topics are written in.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Replaces the few-shot examples. An empty list disables them.
    #[must_use]
    pub fn examples(mut self, examples: Vec<FewShotExample>) -> Self {
        self.examples = examples;
        self
    }

    /// Sets data exposed to templates as `ctx.custom`.
    #[must_use]
    pub fn custom_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.custom_data = data;
        self
    }

    /// Replaces the system message template.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is blank or does not compile.
    pub fn system_template(self, source: &str) -> Result<Self> {
        self.replace_template(SYSTEM, source, TemplateKind::System)
    }

    /// Replaces the human message template.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is blank, does not compile or never
    /// references `ctx.input`.
    pub fn human_template(self, source: &str) -> Result<Self> {
        self.replace_template(HUMAN, source, TemplateKind::Human)
    }

    fn replace_template(mut self, name: &str, source: &str, kind: TemplateKind) -> Result<Self> {
        TemplateValidator::validate_source(source, kind)
            .map_err(|message| Error::template_validation(name, message))?;

        self.tera
            .add_raw_template(name, source)
            .map_err(|e| Error::template(name, e))?;
        Ok(self)
    }

    /// Few-shot examples in use.
    #[must_use]
    pub fn few_shot_examples(&self) -> &[FewShotExample] {
        &self.examples
    }

    /// Renders the full message list for one chunk of text.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or an example cannot be
    /// serialized.
    pub fn format_messages(&self, input: &str) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::with_capacity(2 + self.examples.len() * 2);

        messages.push(ChatMessage::system(self.render(SYSTEM, "")?));

        for example in &self.examples {
            messages.push(ChatMessage::user(self.render(EXAMPLE, &example.context)?));
            messages.push(ChatMessage::assistant(serde_json::to_string(&example.output)?));
        }

        messages.push(ChatMessage::user(self.render(HUMAN, input)?));

        Ok(messages)
    }

    fn render(&self, name: &str, input: &str) -> Result<String> {
        let context = TemplateContext {
            input,
            language: &self.language,
            custom: &self.custom_data,
        };

        let mut tera_context = Context::new();
        tera_context.insert("ctx", &context);

        self.tera
            .render(name, &tera_context)
            .map(|rendered| rendered.trim_end().to_string())
            .map_err(|e| Error::template(name, e))
    }
}

fn read_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use assert_fs::prelude::*;

    #[test]
    fn test_default_message_layout() {
        let prompt = PromptTemplate::new().unwrap();
        let messages = prompt.format_messages("The lion inhabits grasslands.").unwrap();

        // system + 2 examples * (human, ai) + human
        assert_eq!(messages.len(), 6);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User
            ]
        );

        assert!(messages[0].content.ends_with("Write the values of your answer in Dutch."));
        assert!(messages[1].content.contains("It is important to answer with at least 2 and at most 4 topics."));
        assert!(messages[1].content.contains("Context: Photosynthesis in plants"));
        assert_eq!(
            messages[5].content,
            "Identify and extract the main topics discussed in depth in the given context.\n\
             Context: The lion inhabits grasslands."
        );
    }

    #[test]
    fn test_example_answers_are_topic_json() {
        let prompt = PromptTemplate::new().unwrap();
        let messages = prompt.format_messages("x").unwrap();

        let answer: DocumentTopics = serde_json::from_str(&messages[4].content).unwrap();
        assert_eq!(answer.len(), 4);
        assert_eq!(answer.topics[2], "De vacht van de leeuw.");
    }

    #[test]
    fn test_default_examples_are_valid() {
        for example in default_examples() {
            assert!(example.output.validate().is_ok());
        }
    }

    #[test]
    fn test_language_and_no_examples() {
        let prompt = PromptTemplate::new()
            .unwrap()
            .language("English")
            .examples(Vec::new());
        let messages = prompt.format_messages("text").unwrap();

        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("in English."));
    }

    #[test]
    fn test_input_is_not_escaped() {
        let prompt = PromptTemplate::new().unwrap();
        let messages = prompt.format_messages("a < b & \"c\"").unwrap();
        assert!(messages.last().unwrap().content.ends_with("Context: a < b & \"c\""));
    }

    #[test]
    fn test_custom_human_template_with_custom_data() {
        let mut data = HashMap::new();
        data.insert("course".to_string(), serde_json::json!("Biology"));

        let prompt = PromptTemplate::new()
            .unwrap()
            .custom_data(data)
            .human_template("Course {{ ctx.custom.course }}\n{{ ctx.input }}")
            .unwrap();
        let messages = prompt.format_messages("Cells divide.").unwrap();

        assert_eq!(messages.last().unwrap().content, "Course Biology\nCells divide.");
    }

    #[test]
    fn test_human_template_without_input_is_rejected() {
        let result = PromptTemplate::new().unwrap().human_template("No context here");
        assert!(matches!(result, Err(Error::TemplateValidation { .. })));
    }

    #[test]
    fn test_from_config_loads_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        let system = temp.child("system.tera");
        system.write_str("Answer in {{ ctx.language }} only.").unwrap();

        let config = Config::builder()
            .language("French")
            .system_template_path(system.path())
            .examples(vec![FewShotExample::new(
                "Water boils at 100 degrees.",
                DocumentTopics::new(["Boiling point", "Water"]).unwrap(),
            )])
            .build()
            .unwrap();

        let prompt = PromptTemplate::from_config(&config).unwrap();
        let messages = prompt.format_messages("text").unwrap();

        assert_eq!(messages[0].content, "Answer in French only.");
        assert_eq!(prompt.few_shot_examples().len(), 1);
        assert_eq!(messages.len(), 4);
    }
}
