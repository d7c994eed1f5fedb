//! Saída de terminal do ecfjob: mensagens do job e listagens coloridas.
//!
//! Usa a crate `console` para estilização. As cores são desligadas
//! automaticamente quando a saída não é um terminal, como nos logs do LSF.

use std::borrow::Cow;

use console::Style;

use crate::envir::{Layout, PathBindings, Tier};
use crate::lifecycle::LifecycleRecord;

/// Escreve a mensagem de abort no stdout do job, como o `echo` do header.
pub fn announce_abort(message: &str) {
    println!("{}", Style::new().red().bold().apply_to(message));
}

/// Formatação dos comandos `env`, `tiers` e do registro de ciclo de vida.
pub struct JobConsole {
    // Estilo verde para jobs concluídos.
    green: Style,
    // Estilo vermelho para jobs abortados.
    red: Style,
    // Estilo ciano para nomes de tier.
    cyan: Style,
    // Estilo esmaecido para detalhes.
    dim: Style,
}

impl Default for JobConsole {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            cyan: Style::new().cyan(),
            dim: Style::new().dim(),
        }
    }
}

impl JobConsole {
    /// Imprime os bindings como linhas `export` prontas para `eval`.
    pub fn print_exports(&self, bindings: &PathBindings) {
        print!("{}", render_exports(bindings));
    }

    pub fn print_json(&self, bindings: &PathBindings) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string_pretty(bindings)?);
        Ok(())
    }

    /// Lista a tabela de tiers com o EMCPEN padrão e o KEEPDATA de cada um.
    pub fn print_tiers(&self) {
        for tier in Tier::ALL {
            let profile = tier.profile();
            let detail = match &profile.layout {
                Layout::Experiment(layout) => format!(
                    "EMCPEN={} CRAY_F_SET={} KEEPDATA={}",
                    layout.emcpen_default,
                    layout.fs_set,
                    if layout.keepdata { "YES" } else { "NO" }
                ),
                Layout::Operational(layout) => {
                    format!("envir={} DATAROOT={}", layout.envir, layout.dataroot)
                }
            };
            println!(
                "{:<8} {}",
                self.cyan.apply_to(tier.name()),
                self.dim.apply_to(detail)
            );
        }
    }

    /// Imprime o registro de ciclo de vida em JSON, com cabeçalho colorido.
    pub fn print_record(&self, record: &LifecycleRecord) {
        let (style, title) = match record.abort_message {
            Some(_) => (&self.red, "─── Job aborted ───"),
            None => (&self.green, "─── Job completed ───"),
        };
        eprintln!("{}", style.apply_to(title));
        eprintln!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}

pub fn render_exports(bindings: &PathBindings) -> String {
    bindings
        .iter()
        .map(|(key, value)| format!("export {key}={}\n", shell_quote(value)))
        .collect()
}

/// Quote `value` for POSIX sh when it contains anything unusual.
pub fn shell_quote(value: &str) -> Cow<'_, str> {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_/.,:=+@%-".contains(c));
    if plain {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::envir::{Environment, Resolver};

    #[test]
    fn plain_values_are_not_quoted() {
        assert_eq!(shell_quote("/gpfs/hps2/ptmp"), "/gpfs/hps2/ptmp");
        assert_eq!(shell_quote("v15.0.0"), "v15.0.0");
    }

    #[test]
    fn unusual_values_are_quoted() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn exports_are_sorted_lines() {
        let env = Environment::default();
        let config = SiteConfig::default();
        let bindings = Resolver::new(&config, &env).resolve("prod").unwrap();
        let text = render_exports(&bindings);

        assert!(text.lines().all(|l| l.starts_with("export ")));
        assert_eq!(text.lines().count(), bindings.len());
        assert!(text.contains("export KEEPDATA=NO\n"));
    }
}
