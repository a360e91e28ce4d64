//! Prompt assembly for the extraction and conversation model calls.
//!
//! The answer schema the prompts request is exactly what
//! `lanca_core::airesponse` parses; keep the two in sync when adding
//! fields.

use lanca_core::SessionTurn;

/// System prompt for document/text extraction calls.
pub const EXTRACTION_SYSTEM: &str = "\
Você é um assistente financeiro. Extraia transações financeiras do conteúdo \
enviado e responda SOMENTE com um objeto JSON neste formato:\n\
{\n\
  \"transacoes\": [{\"descricao\": \"...\", \"valor\": 0.0, \"categoria\": \"...\", \
\"tipo\": \"income|expense\", \"data\": \"AAAA-MM-DD\", \"moeda\": \"BRL\"}],\n\
  \"total_fatura\": 0.0,\n\
  \"vencimento\": \"AAAA-MM-DD\",\n\
  \"confidence_score\": 0.0\n\
}\n\
Omita campos que não se aplicam. Se não houver nenhuma transação, responda \
em texto simples, sem JSON.";

/// System prompt for conversational turns.
pub const CONVERSATION_SYSTEM: &str = "\
Você é um assistente financeiro pessoal. Responda de forma curta e clara. \
Quando a mensagem do usuário registrar um gasto ou receita, inclua na \
resposta um objeto JSON com os campos transacoes e confidence_score; caso \
contrário responda apenas com texto.";

/// Build the extraction prompt for extracted document text.
pub fn extraction_prompt(content: &str, caption: Option<&str>) -> String {
    match caption.filter(|c| !c.trim().is_empty()) {
        Some(caption) => format!(
            "Legenda do usuário: {caption}\n\nConteúdo do documento:\n{content}"
        ),
        None => format!("Conteúdo do documento:\n{content}"),
    }
}

/// Build the prompt a vision model answers about a receipt/document photo.
pub fn image_prompt(caption: Option<&str>) -> String {
    let base = "Leia a imagem (recibo, nota fiscal ou comprovante) e extraia as \
transações no formato JSON combinado: {\"transacoes\": [{\"descricao\", \
\"valor\", \"categoria\", \"tipo\", \"data\", \"moeda\"}], \"confidence_score\"}. \
Se a imagem não contiver dados financeiros, descreva-a em texto simples.";
    match caption.filter(|c| !c.trim().is_empty()) {
        Some(caption) => format!("{base}\n\nLegenda do usuário: {caption}"),
        None => base.to_string(),
    }
}

/// Build the conversational prompt including prior context turns.
pub fn conversation_prompt(context: &[SessionTurn], message: &str) -> String {
    let mut prompt = String::new();
    if !context.is_empty() {
        prompt.push_str("Conversa até agora:\n");
        for turn in context {
            let speaker = match turn.role {
                lanca_core::TurnRole::User => "Usuário",
                lanca_core::TurnRole::Assistant => "Assistente",
            };
            prompt.push_str(&format!("{speaker}: {}\n", turn.content));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!("Usuário: {message}"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_with_caption() {
        let prompt = extraction_prompt("linha 1", Some("cartão de crédito"));
        assert!(prompt.contains("cartão de crédito"));
        assert!(prompt.contains("linha 1"));
    }

    #[test]
    fn test_extraction_prompt_blank_caption_omitted() {
        let prompt = extraction_prompt("linha 1", Some("   "));
        assert!(!prompt.contains("Legenda"));
    }

    #[test]
    fn test_conversation_prompt_includes_history() {
        let context = vec![
            SessionTurn::user("gastei 20 no almoço"),
            SessionTurn::assistant("Registrado!"),
        ];
        let prompt = conversation_prompt(&context, "e 10 no café");
        assert!(prompt.contains("gastei 20 no almoço"));
        assert!(prompt.contains("Registrado!"));
        assert!(prompt.ends_with("Usuário: e 10 no café"));
    }

    #[test]
    fn test_conversation_prompt_without_history() {
        let prompt = conversation_prompt(&[], "oi");
        assert_eq!(prompt, "Usuário: oi");
    }

    #[test]
    fn test_schema_keys_match_wire_parser() {
        // The prompt must ask for the same keys airesponse parses.
        for key in ["transacoes", "valor", "confidence_score", "vencimento"] {
            assert!(EXTRACTION_SYSTEM.contains(key), "missing key {key}");
        }
    }
}
