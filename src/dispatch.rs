use tracing::info;

use crate::llm::{CompletionClient, CompletionResult, ErrorKind};
use crate::probe::{ConnectionStatus, Prober};

/// One inbound chat message, already reduced to what routing needs.
/// Built by a transport from the raw platform update, dropped after dispatch.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: String,
    pub is_command: bool,
    pub command: Option<String>,
}

impl InboundMessage {
    pub fn from_text(chat_id: i64, text: &str) -> Self {
        let trimmed = text.trim();
        let command = trimmed.strip_prefix('/').map(|rest| {
            let name = rest.split_whitespace().next().unwrap_or("");
            // Group chats address commands as /cmd@BotName.
            let name = name.split('@').next().unwrap_or(name);
            name.to_lowercase()
        });
        Self {
            chat_id,
            text: text.to_string(),
            is_command: command.is_some(),
            command,
        }
    }

    /// Text after the command token, trimmed.
    fn argument(&self) -> &str {
        let trimmed = self.text.trim();
        match trimmed.split_once(char::is_whitespace) {
            Some((_, rest)) => rest.trim(),
            None => "",
        }
    }
}

/// What the dispatcher decided to do with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Welcome/status template, embeds a fresh probe.
    Welcome,
    /// Forward this prompt to the completion service.
    Query(String),
    /// Recognized query command with no argument.
    UsageError,
    /// Free text that was empty or whitespace.
    EmptyInput,
    /// Unrecognized slash command; no reply at all.
    Ignore,
}

impl Action {
    /// True when handling this action hits the completion service, so the
    /// transport should flash a typing indicator first.
    pub fn needs_upstream(&self) -> bool {
        matches!(self, Action::Welcome | Action::Query(_))
    }
}

/// Pure routing: no I/O, fully unit-testable.
pub fn route(msg: &InboundMessage) -> Action {
    if let Some(command) = msg.command.as_deref() {
        let argument = msg.argument();
        return match command {
            "start" | "help" => Action::Welcome,
            "adan" if argument.is_empty() => Action::Welcome,
            "adan" => Action::Query(argument.to_string()),
            "ask" | "consulta" if argument.is_empty() => Action::UsageError,
            "ask" | "consulta" => Action::Query(argument.to_string()),
            _ => Action::Ignore,
        };
    }
    let trimmed = msg.text.trim();
    if trimmed.is_empty() {
        Action::EmptyInput
    } else {
        Action::Query(trimmed.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct OutboundReply {
    pub text: String,
}

const REPLY_HEADER: &str = "🤖 Adán responde:";

const USAGE_REPLY: &str = "Uso: /ask <tu pregunta>\nEjemplo: /ask ¿Cuál es la capital de Perú?";

const EMPTY_INPUT_REPLY: &str =
    "No recibí ninguna pregunta. Escríbeme algo o usa /ask <tu pregunta>.";

fn welcome_reply(status: &ConnectionStatus) -> String {
    let state_line = if status.reachable {
        match status.latency_ms {
            Some(latency) => format!("✅ conectado ({:.0} ms)", latency),
            None => "✅ conectado".to_string(),
        }
    } else {
        format!("⚠️ sin conexión: {}", status.message)
    };
    format!(
        "¡Hola! Soy Adán, tu asistente con IA.\n\n\
         Comandos:\n\
         /ask <pregunta> - Hacer una consulta\n\
         /help - Ver este mensaje\n\n\
         También puedes escribirme directamente.\n\n\
         Estado del servicio: {}",
        state_line
    )
}

fn failure_reply(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Timeout => {
            "⏱ El servicio tardó demasiado en responder. Inténtalo de nuevo en unos momentos."
        }
        ErrorKind::ConnectionError => {
            "🔌 No pude conectar con el servicio de IA. Inténtalo más tarde."
        }
        ErrorKind::UpstreamError => {
            "⚠️ El servicio de IA devolvió un error. Inténtalo de nuevo más tarde."
        }
        ErrorKind::MalformedResponse => {
            "⚠️ Recibí una respuesta inesperada del servicio. Inténtalo de nuevo."
        }
    }
}

/// Routes one inbound message to a static reply or the completion client.
/// Stateless across messages; safe to share between handler tasks.
pub struct Dispatcher {
    client: CompletionClient,
    prober: Prober,
}

impl Dispatcher {
    pub fn new(client: CompletionClient, prober: Prober) -> Self {
        Self { client, prober }
    }

    /// Returns `None` only for unrecognized commands; a failed query always
    /// gets a reply.
    pub async fn dispatch(&self, msg: &InboundMessage) -> Option<OutboundReply> {
        let action = route(msg);
        info!(chat_id = msg.chat_id, action = discriminant_name(&action), "Dispatching message");

        let text = match action {
            Action::Welcome => {
                // Probe on every status command; never cache the result.
                let status = self.prober.probe().await;
                welcome_reply(&status)
            }
            Action::Query(prompt) => match self.client.query(&prompt).await {
                CompletionResult::Success { text, .. } => {
                    format!("{}\n\n{}", REPLY_HEADER, text)
                }
                CompletionResult::Failure { kind, .. } => failure_reply(kind).to_string(),
            },
            Action::UsageError => USAGE_REPLY.to_string(),
            Action::EmptyInput => EMPTY_INPUT_REPLY.to_string(),
            Action::Ignore => return None,
        };

        Some(OutboundReply { text })
    }
}

fn discriminant_name(action: &Action) -> &'static str {
    match action {
        Action::Welcome => "welcome",
        Action::Query(_) => "query",
        Action::UsageError => "usage_error",
        Action::EmptyInput => "empty_input",
        Action::Ignore => "ignore",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str) -> InboundMessage {
        InboundMessage::from_text(7, text)
    }

    #[test]
    fn start_help_and_bare_adan_are_status_commands() {
        assert_eq!(route(&msg("/start")), Action::Welcome);
        assert_eq!(route(&msg("/help")), Action::Welcome);
        assert_eq!(route(&msg("/adan")), Action::Welcome);
    }

    #[test]
    fn query_commands_forward_their_argument() {
        assert_eq!(
            route(&msg("/ask What is 2+2?")),
            Action::Query("What is 2+2?".to_string())
        );
        assert_eq!(
            route(&msg("/consulta ¿qué hora es?")),
            Action::Query("¿qué hora es?".to_string())
        );
        assert_eq!(
            route(&msg("/adan dime un chiste")),
            Action::Query("dime un chiste".to_string())
        );
    }

    #[test]
    fn query_commands_without_argument_get_usage_error() {
        assert_eq!(route(&msg("/ask")), Action::UsageError);
        assert_eq!(route(&msg("/consulta   ")), Action::UsageError);
    }

    #[test]
    fn group_suffix_is_stripped_from_commands() {
        assert_eq!(route(&msg("/start@AdanBot")), Action::Welcome);
        assert_eq!(
            route(&msg("/ask@AdanBot hola")),
            Action::Query("hola".to_string())
        );
    }

    #[test]
    fn free_text_becomes_a_query() {
        assert_eq!(route(&msg("hello")), Action::Query("hello".to_string()));
    }

    #[test]
    fn whitespace_only_text_is_rejected_without_upstream() {
        let action = route(&msg("   \n\t"));
        assert_eq!(action, Action::EmptyInput);
        assert!(!action.needs_upstream());
    }

    #[test]
    fn unknown_commands_are_silently_ignored() {
        assert_eq!(route(&msg("/banana")), Action::Ignore);
        assert_eq!(route(&msg("/stop now")), Action::Ignore);
    }

    #[test]
    fn upstream_actions_want_a_typing_indicator() {
        assert!(route(&msg("/start")).needs_upstream());
        assert!(route(&msg("hola")).needs_upstream());
        assert!(!route(&msg("/ask")).needs_upstream());
    }

    #[test]
    fn welcome_embeds_probe_state() {
        let up = ConnectionStatus {
            reachable: true,
            latency_ms: Some(123.4),
            message: "servicio disponible".to_string(),
        };
        let reply = welcome_reply(&up);
        assert!(reply.contains("✅ conectado (123 ms)"));

        let down = ConnectionStatus {
            reachable: false,
            latency_ms: None,
            message: "no se pudo conectar con el servicio".to_string(),
        };
        let reply = welcome_reply(&down);
        assert!(reply.contains("⚠️ sin conexión: no se pudo conectar con el servicio"));
    }

    #[test]
    fn failure_replies_never_leak_detail() {
        for kind in [
            ErrorKind::Timeout,
            ErrorKind::ConnectionError,
            ErrorKind::UpstreamError,
            ErrorKind::MalformedResponse,
        ] {
            let reply = failure_reply(kind);
            assert!(!reply.is_empty());
            assert!(!reply.contains("HTTP"));
        }
    }
}
