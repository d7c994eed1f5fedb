//! Tipos de erro para o cliente do agendador ecFlow.
//!
//! Define [`ClientError`] com variantes para cliente ausente, falha ao
//! iniciar o processo e retorno não-zero. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros ao invocar o `ecflow_client`.
///
/// Todos são tratados como melhor-esforço pelo chamador: são registrados
/// no log e nunca alteram o status de saída do job.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Nenhum executável encontrado na configuração, no `PATH` ou nos
    /// diretórios de busca.
    #[error("ecflow_client not found (searched PATH and configured dirs)")]
    NotFound,

    /// O processo do cliente não pôde ser iniciado.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// O cliente terminou com status diferente de zero.
    /// `status` é `None` quando o cliente foi morto por sinal.
    #[error("{program} {arg} exited with {}: {stderr}", status.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    Failed {
        program: String,
        arg: String,
        status: Option<i32>,
        stderr: String,
    },
}
