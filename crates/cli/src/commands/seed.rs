use crate::commands::{build_runtime, load_config, open_database, CommandResult, StepFailure};
use parley_core::domain::agent::{
    DEFAULT_BRAND_COLOR, DEFAULT_INPUT_PLACEHOLDER, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, DEFAULT_WELCOME_MESSAGE,
};
use parley_core::{slug, AgentDraft};
use parley_db::repositories::SqlAgentRepository;

const DEMO_AGENT_NAME: &str = "Assistente de Vendas";

const DEMO_SYSTEM_PROMPT: &str = "\
Você é um assistente de vendas inteligente e prestável.

Seu objetivo é:
1. Cumprimentar o cliente de forma calorosa
2. Entender as necessidades dele
3. Fazer perguntas relevantes para qualificar o lead
4. Sugerir produtos/serviços adequados
5. Responder dúvidas com clareza
6. Incentivar o próximo passo (agendar reunião, fazer pedido, etc)

Sempre:
- Seja educado e profissional
- Seja conciso mas completo
- Demonstre entusiasmo genuíno
- Personalize as respostas

Nunca:
- Seja insistente demais
- Faça promessas que não pode cumprir
- Use linguagem técnica sem explicar
- Ignore as preocupações do cliente";

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let repo = SqlAgentRepository::new(pool.clone());
        let existing =
            repo.list().await.map_err(|error| ("seed", error.to_string(), 6u8))?;
        if !existing.is_empty() {
            pool.close().await;
            return Ok(format!("agents already present ({}), nothing seeded", existing.len()));
        }

        let agent = demo_agent_draft().into_agent();
        repo.insert(&agent).await.map_err(|error| ("seed", error.to_string(), 6u8))?;
        let message = format!("seeded demo agent `{}` ({})", agent.slug, agent.id);
        pool.close().await;
        Ok::<String, StepFailure>(message)
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn demo_agent_draft() -> AgentDraft {
    AgentDraft {
        name: DEMO_AGENT_NAME.to_string(),
        slug: slug::normalize(DEMO_AGENT_NAME),
        description: Some("Agente de demonstração para vendas".to_string()),
        avatar_url: None,
        system_prompt: DEMO_SYSTEM_PROMPT.to_string(),
        model: DEFAULT_MODEL.to_string(),
        temperature: DEFAULT_TEMPERATURE,
        max_tokens: DEFAULT_MAX_TOKENS,
        top_p: 1.0,
        frequency_penalty: 0.0,
        presence_penalty: 0.0,
        rag_enabled: false,
        whatsapp_enabled: false,
        whatsapp_number: None,
        email_enabled: false,
        email_address: None,
        web_enabled: true,
        is_active: true,
        allow_public_access: true,
        brand_color: DEFAULT_BRAND_COLOR.to_string(),
        welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
        input_placeholder: DEFAULT_INPUT_PLACEHOLDER.to_string(),
        meta_title: None,
        meta_description: None,
        og_image_url: None,
    }
}
