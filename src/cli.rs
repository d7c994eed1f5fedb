//! Interface de linha de comando do ecfjob baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, env, tiers)
//! e flags globais (--config, --envir, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// ecfjob — cabeçalho de jobs ecFlow: resolução de tier e anúncio ao agendador.
#[derive(Debug, Parser)]
#[command(name = "ecfjob", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração do site (padrão: $ECFJOB_CONFIG ou ./ecfjob.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tier de ambiente (prod, para, test, eval, emcpara); sobrepõe $envir.
    ///
    /// Aceito como texto livre: um tier desconhecido aborta o job via agendador.
    #[arg(long, global = true)]
    pub envir: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Formato de saída do subcomando `env`.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum EnvFormat {
    /// Linhas `export KEY=VALUE` para `eval`.
    #[default]
    Shell,
    /// Objeto JSON plano.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Anuncia o job, resolve o ambiente e executa o corpo do job.
    Run {
        /// Programa e argumentos do corpo do job.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Resolve o tier e imprime os bindings sem falar com o agendador.
    Env {
        #[arg(long, value_enum, default_value_t = EnvFormat::Shell)]
        format: EnvFormat,
    },

    /// Lista os tiers conhecidos.
    Tiers,
}
