//! Support assistant: prompt construction on top of a text generator.
//!

use crate::core::traits::ChatModel;
use crate::infrastructure::entities::Product;
use crate::infrastructure::gemini::GenerationError;
use crate::infrastructure::traits::TextGenerator;
use async_trait::async_trait;
use di::Ref;
use log::debug;
use minijinja::{Environment, context};

const SYSTEM_TEMPLATE: &str = r#"You are a helpful and friendly customer service chatbot for {{ shop_name }} - an e-commerce website.
{% if product_context %}
Here are the relevant products available:
{{ product_context }}
{% endif %}
Guidelines:
- Be professional but friendly and conversational
- Ask clarifying questions to understand customer needs
- Recommend relevant products based on their requirements
- Provide product information accurately
- If you mention a product, include its name and approximate price
- Suggest similar products or complementary items
- Be honest if we don't have what they're looking for
- Encourage them to browse the website for more options
- Respond in the same language as the customer

Important: Always prioritize being helpful and providing accurate product information.

Customer message: {{ user_message }}"#;

const RECOMMEND_TEMPLATE: &str = r#"Based on the user's preferences: "{{ preferences }}"

Available products:
{% for product in products %}- {{ product.title }}: {{ product.summary }}
{% endfor %}
Recommend 2-3 most suitable products with brief explanations why they match the user's needs. Format the response as a readable list."#;

/// Products offered to the model when asking for recommendations.
pub const MAX_RECOMMENDATION_PRODUCTS: usize = 10;
const CONTEXT_DESCRIPTION_CHARS: usize = 80;
const RECOMMENDATION_DESCRIPTION_CHARS: usize = 100;

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Grounding context: one `- title: description... (priceđ)` line per product.
pub fn product_context(products: &[Product]) -> String {
    products
        .iter()
        .map(|p| {
            format!(
                "- {}: {}... ({}đ)",
                p.title,
                truncate_chars(
                    p.description.as_deref().unwrap_or_default(),
                    CONTEXT_DESCRIPTION_CHARS
                ),
                p.price
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Assistant {
    generator: Ref<dyn TextGenerator>,
    templates: Environment<'static>,
    shop_name: String,
}

impl Assistant {
    pub fn new(
        generator: Ref<dyn TextGenerator>,
        shop_name: impl Into<String>,
    ) -> Result<Assistant, GenerationError> {
        let mut templates = Environment::new();
        templates.add_template("system", SYSTEM_TEMPLATE)?;
        templates.add_template("recommend", RECOMMEND_TEMPLATE)?;

        Ok(Assistant {
            generator,
            templates,
            shop_name: shop_name.into(),
        })
    }

    pub fn chat_prompt(
        &self,
        user_message: &str,
        product_context: &str,
    ) -> Result<String, GenerationError> {
        let template = self.templates.get_template("system")?;
        Ok(template.render(context! {
            shop_name => self.shop_name,
            product_context => product_context,
            user_message => user_message,
        })?)
    }

    pub fn recommendation_prompt(
        &self,
        preferences: &str,
        products: &[Product],
    ) -> Result<String, GenerationError> {
        let products: Vec<minijinja::Value> = products
            .iter()
            .take(MAX_RECOMMENDATION_PRODUCTS)
            .map(|p| {
                context! {
                    title => p.title,
                    summary => truncate_chars(
                        p.description.as_deref().unwrap_or_default(),
                        RECOMMENDATION_DESCRIPTION_CHARS,
                    ),
                }
            })
            .collect();

        let template = self.templates.get_template("recommend")?;
        Ok(template.render(context! {
            preferences => preferences,
            products => products,
        })?)
    }
}

#[async_trait]
impl ChatModel for Assistant {
    async fn generate(
        &self,
        user_message: &str,
        product_context: &str,
    ) -> Result<String, GenerationError> {
        let prompt = self.chat_prompt(user_message, product_context)?;
        debug!("chat prompt is {} chars", prompt.chars().count());
        self.generator.generate_text(&prompt).await
    }

    async fn recommend(
        &self,
        preferences: &str,
        products: &[Product],
    ) -> Result<String, GenerationError> {
        let prompt = self.recommendation_prompt(preferences, products)?;
        self.generator.generate_text(&prompt).await
    }
}
