use tracing::debug;

use super::bindings::{BindingsBuilder, Environment, PathBindings};
use super::tier::{ExperimentLayout, FAKE_DBN, Layout, OperationalLayout, Tier};
use super::version::VersionFile;
use crate::config::{Placeholders, SiteConfig};
use crate::error::JobError;

/// Turns a tier name plus site configuration into the job's bindings.
pub struct Resolver<'a> {
    config: &'a SiteConfig,
    env: &'a Environment,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a SiteConfig, env: &'a Environment) -> Self {
        Self { config, env }
    }

    /// Tier name to resolve: CLI flag, then `$envir`, then the site default.
    pub fn select_tier_name(&self, cli: Option<&str>) -> String {
        cli.or_else(|| self.env.get("envir"))
            .unwrap_or(&self.config.default_envir)
            .to_string()
    }

    /// Resolve every binding for `tier_name`.
    ///
    /// Inherited values always win, except `envir` (the effective tier) and
    /// `SENDDBN_NTC` when `eval` sends to the live downstream.
    pub fn resolve(&self, tier_name: &str) -> Result<PathBindings, JobError> {
        let tier: Tier = tier_name.parse()?;
        let profile = tier.profile();
        let ph = &self.config.placeholders;
        let mut b = BindingsBuilder::new(self.env);

        self.header(&mut b, profile.effective_envir());

        let util_root = b.set_default("UTILROOT", self.config.util_root.as_str());
        match &profile.layout {
            Layout::Experiment(layout) => Self::experiment(&mut b, layout, ph, &util_root),
            Layout::Operational(layout) => {
                self.operational(&mut b, layout, profile.effective_envir(), &util_root)
            }
        }

        Self::trailer(&mut b, ph);
        self.model_version(&mut b, tier)?;

        for (key, value) in &self.config.exports {
            b.set_default(key.as_str(), value.as_str());
        }

        let bindings = b.finish();
        debug!(tier = %tier, count = bindings.len(), "resolved environment bindings");
        Ok(bindings)
    }

    fn header(&self, b: &mut BindingsBuilder<'_>, envir: &str) {
        let ph = &self.config.placeholders;

        if let Some(job) = self.env.get("job").or_else(|| self.env.get("LSB_JOBNAME")) {
            let job = b.set_default("job", job);
            if let Some(lsf_id) = self.env.get("LSB_JOBID") {
                b.set_default("jobid", format!("{job}.{lsf_id}"));
            } else if let Some(jobid) = self.env.get("jobid") {
                b.set_default("jobid", jobid);
            }
        }

        b.force("envir", envir);
        b.set_default("RUN_ENVIR", "para");
        b.default_or_placeholder("SENDDBN", Placeholders::non_empty(&ph.senddbn), "YES");
        b.default_or_placeholder("SENDDBN_NTC", Placeholders::non_empty(&ph.senddbn_ntc), "YES");
    }

    fn experiment(
        b: &mut BindingsBuilder<'_>,
        layout: &ExperimentLayout,
        ph: &Placeholders,
        util_root: &str,
    ) {
        let fs = b.set_default("CRAY_F_SET", layout.fs_set);
        let pen = b.default_or_placeholder(
            "EMCPEN",
            Placeholders::non_empty(&ph.emcpen),
            layout.emcpen_default,
        );
        let root = format!("/gpfs/{fs}/ptmp/emc.glopara/{pen}");

        b.set_default("jlogfile", format!("{root}/com/jlogfile"));
        b.set_default("DATAROOT", format!("/gpfs/{fs}/stmp/emc.glopara/{pen}"));
        b.set_default("DBNROOT", format!("{util_root}/{FAKE_DBN}"));
        b.set_default("NWROOT", layout.nwroot);
        if let Some(nwprod) = layout.nwprod {
            b.set_default("NWPROD", nwprod);
        }

        let comroot = b.set_default("COMROOT", format!("{root}/com"));
        b.set_default("PCOMROOT", format!("{root}/{}", layout.pcom_suffix));
        if layout.publishes_gesroot {
            b.set_default("COMOUT_ROOT", comroot);
            let gesroot = format!("{root}/nwges");
            for key in ["GESROOT", "GESROOThps", "GESROOTp1", "GESROOTp2"] {
                b.set_default(key, gesroot.as_str());
            }
        }

        b.set_default("KEEPDATA", if layout.keepdata { "YES" } else { "NO" });
    }

    fn operational(
        &self,
        b: &mut BindingsBuilder<'_>,
        layout: &OperationalLayout,
        envir: &str,
        util_root: &str,
    ) {
        let comroot = b.set_default("COMROOT", self.config.com_root.as_str());
        b.set_default("jlogfile", format!("{comroot}/logs/{envir}/jlogfile"));
        b.set_default("DATAROOT", layout.dataroot);

        let sends = b.lookup("SENDDBN").as_deref() == Some("YES");
        if sends {
            b.set_default("DBNROOT", format!("{util_root}/{}", layout.live_dbn));
            b.force("SENDDBN_NTC", "NO");
        } else {
            b.set_default("DBNROOT", format!("{util_root}/{FAKE_DBN}"));
        }
    }

    fn trailer(b: &mut BindingsBuilder<'_>, ph: &Placeholders) {
        b.set_default("SENDECF", "YES");
        b.set_default("SENDCOM", "YES");

        if let Some(pdy) = Placeholders::non_empty(&ph.pdy) {
            b.set_default("PDY", pdy);
            b.set_default("RETRORUN", "YES");
        }
        let optional = [
            ("COMPATH", &ph.compath),
            ("MAILTO", &ph.mailto),
            ("DBNLOG", &ph.dbnlog),
        ];
        for (key, value) in optional {
            if let Some(value) = Placeholders::non_empty(value) {
                b.set_default(key, value);
            }
        }
    }

    fn model_version(&self, b: &mut BindingsBuilder<'_>, tier: Tier) -> Result<(), JobError> {
        let Some(model) = self
            .env
            .get("model")
            .map(str::to_string)
            .or_else(|| self.config.model.name.clone())
        else {
            return Ok(());
        };

        let file = VersionFile::load(&self.config.model.versions_dir, &model)?;
        for (key, value) in &file.assignments {
            b.set_default(key.as_str(), value.as_str());
        }

        let version = b
            .lookup(&file.version_key())
            .ok_or_else(|| JobError::MissingModelVersion(model.clone()))?;
        let nwroot = b.lookup("NWROOT").ok_or_else(|| {
            JobError::Config(format!("NWROOT is not defined for tier {tier}"))
        })?;
        b.set_default(format!("HOME{model}"), format!("{nwroot}/{model}.{version}"));
        debug!(model = %model, version = %version, path = %file.path.display(), "applied model versions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(env: &Environment, config: &SiteConfig, tier: &str) -> PathBindings {
        Resolver::new(config, env).resolve(tier).unwrap()
    }

    #[test]
    fn all_tiers_resolve_without_placeholder_tokens() {
        let config = SiteConfig::default();
        let env = Environment::default();
        for tier in Tier::ALL {
            let bindings = resolve(&env, &config, tier.name());
            assert!(!bindings.is_empty(), "{tier} produced no bindings");
            for key in ["envir", "DATAROOT", "COMROOT", "DBNROOT", "jlogfile", "SENDECF"] {
                assert!(bindings.get(key).is_some(), "{tier} is missing {key}");
            }
            for (key, value) in bindings.iter() {
                assert!(!value.is_empty(), "{tier}: {key} is empty");
                assert!(!value.contains('%'), "{tier}: {key}={value} has a placeholder");
            }
        }
    }

    #[test]
    fn prod_defaults_emcpen_and_roots_paths_under_it() {
        let bindings = resolve(&Environment::default(), &SiteConfig::default(), "prod");
        assert_eq!(bindings.get("EMCPEN"), Some("ecfgfsfv3"));
        assert_eq!(bindings.get("CRAY_F_SET"), Some("hps2"));
        assert_eq!(bindings.get("KEEPDATA"), Some("NO"));
        assert_eq!(
            bindings.get("COMROOT"),
            Some("/gpfs/hps2/ptmp/emc.glopara/ecfgfsfv3/com")
        );
        assert_eq!(bindings.get("COMOUT_ROOT"), bindings.get("COMROOT"));
        assert_eq!(
            bindings.get("PCOMROOT"),
            Some("/gpfs/hps2/ptmp/emc.glopara/ecfgfsfv3/pcom/prod")
        );
        assert_eq!(
            bindings.get("DATAROOT"),
            Some("/gpfs/hps2/stmp/emc.glopara/ecfgfsfv3")
        );
        for key in ["GESROOT", "GESROOThps", "GESROOTp1", "GESROOTp2"] {
            assert_eq!(
                bindings.get(key),
                Some("/gpfs/hps2/ptmp/emc.glopara/ecfgfsfv3/nwges")
            );
        }
        assert!(bindings.get("NWPROD").is_some());
        for key in ["jlogfile", "DATAROOT", "COMROOT", "PCOMROOT", "GESROOT"] {
            assert!(bindings.get(key).unwrap().contains("/ecfgfsfv3"));
        }
    }

    #[test]
    fn para_and_test_keep_data() {
        for tier in ["para", "test"] {
            let bindings = resolve(&Environment::default(), &SiteConfig::default(), tier);
            assert_eq!(bindings.get("EMCPEN"), Some("ecfgfs2017"));
            assert_eq!(bindings.get("KEEPDATA"), Some("YES"));
            assert_eq!(bindings.get("envir"), Some(tier));
            assert!(bindings.get("NWPROD").is_none());
            assert!(bindings.get("GESROOT").is_some());
        }
    }

    #[test]
    fn emcpara_has_no_gesroot_family() {
        let bindings = resolve(&Environment::default(), &SiteConfig::default(), "emcpara");
        assert_eq!(
            bindings.get("PCOMROOT"),
            Some("/gpfs/hps2/ptmp/emc.glopara/ecfgfs2017/pcom")
        );
        assert!(bindings.get("COMOUT_ROOT").is_none());
        assert!(bindings.get("GESROOT").is_none());
        assert_eq!(bindings.get("KEEPDATA"), Some("YES"));
    }

    #[test]
    fn eval_with_senddbn_uses_live_downstream() {
        let env = Environment::from_pairs([
            ("SENDDBN", "YES"),
            ("SENDDBN_NTC", "YES"),
            ("UTILROOT", "/nwprod/util"),
        ]);
        let bindings = resolve(&env, &SiteConfig::default(), "eval");
        assert_eq!(bindings.get("DBNROOT"), Some("/nwprod/util/para_dbn"));
        assert_eq!(bindings.get("SENDDBN_NTC"), Some("NO"));
        assert_eq!(bindings.get("envir"), Some("para"));
        assert_eq!(bindings.get("DATAROOT"), Some("/gpfs/hps2/nco/ops/tmpnwprd"));
    }

    #[test]
    fn eval_without_senddbn_uses_fake_downstream() {
        let env = Environment::from_pairs([("SENDDBN", "NO"), ("COMROOT", "/com")]);
        let bindings = resolve(&env, &SiteConfig::default(), "eval");
        assert!(bindings.get("DBNROOT").unwrap().ends_with("/fakedbn"));
        assert_eq!(bindings.get("SENDDBN_NTC"), Some("YES"));
        assert_eq!(bindings.get("jlogfile"), Some("/com/logs/para/jlogfile"));
    }

    #[test]
    fn non_utf8_preset_is_left_to_the_inherited_environment() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let env = Environment::from_os_pairs([(
            OsString::from("DATAROOT"),
            OsString::from_vec(b"/stmp/\xfe".to_vec()),
        )]);
        let bindings = resolve(&env, &SiteConfig::default(), "prod");
        assert_eq!(bindings.get("DATAROOT"), None);
        assert_eq!(bindings.get("KEEPDATA"), Some("NO"));
    }

    #[test]
    fn preset_values_are_never_overwritten() {
        let env = Environment::from_pairs([
            ("DATAROOT", "/scratch/mine"),
            ("EMCPEN", "mypen"),
            ("KEEPDATA", "YES"),
            ("SENDECF", "NO"),
        ]);
        let bindings = resolve(&env, &SiteConfig::default(), "prod");
        assert_eq!(bindings.get("DATAROOT"), Some("/scratch/mine"));
        assert_eq!(bindings.get("KEEPDATA"), Some("YES"));
        assert_eq!(bindings.get("SENDECF"), Some("NO"));
        assert_eq!(
            bindings.get("COMROOT"),
            Some("/gpfs/hps2/ptmp/emc.glopara/mypen/com")
        );
    }

    #[test]
    fn placeholders_fill_optional_variables() {
        let mut config = SiteConfig::default();
        config.placeholders.emcpen = Some("phpen".into());
        config.placeholders.pdy = Some("20180101".into());
        config.placeholders.mailto = Some("ops@example.org".into());
        config.placeholders.compath = Some(String::new());

        let bindings = resolve(&Environment::default(), &config, "para");
        assert_eq!(bindings.get("EMCPEN"), Some("phpen"));
        assert_eq!(bindings.get("PDY"), Some("20180101"));
        assert_eq!(bindings.get("RETRORUN"), Some("YES"));
        assert_eq!(bindings.get("MAILTO"), Some("ops@example.org"));
        assert!(bindings.get("COMPATH").is_none());
        assert!(bindings.get("DBNLOG").is_none());
    }

    #[test]
    fn no_pdy_means_no_retrorun() {
        let bindings = resolve(&Environment::default(), &SiteConfig::default(), "prod");
        assert!(bindings.get("PDY").is_none());
        assert!(bindings.get("RETRORUN").is_none());
    }

    #[test]
    fn job_and_jobid_come_from_lsf() {
        let env = Environment::from_pairs([("LSB_JOBNAME", "gfs_fcst"), ("LSB_JOBID", "4242")]);
        let bindings = resolve(&env, &SiteConfig::default(), "prod");
        assert_eq!(bindings.get("job"), Some("gfs_fcst"));
        assert_eq!(bindings.get("jobid"), Some("gfs_fcst.4242"));
    }

    #[test]
    fn unknown_tier_yields_no_bindings() {
        let config = SiteConfig::default();
        let env = Environment::default();
        let err = Resolver::new(&config, &env).resolve("bogus").unwrap_err();
        assert!(err.to_string().contains("ENVIR must be prod, para, eval,emcpara , or test"));
    }

    #[test]
    fn tier_selection_precedence() {
        let config = SiteConfig::default();
        let env = Environment::from_pairs([("envir", "para")]);
        let resolver = Resolver::new(&config, &env);
        assert_eq!(resolver.select_tier_name(Some("test")), "test");
        assert_eq!(resolver.select_tier_name(None), "para");

        let empty = Environment::default();
        assert_eq!(Resolver::new(&config, &empty).select_tier_name(None), "prod");
    }

    #[test]
    fn model_version_sets_home_and_exports_pins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("gfs.ver"),
            "export gfs_ver=v15.0.0\nexport prod_util_ver=v1.0.5\n",
        )
        .unwrap();

        let mut config = SiteConfig::default();
        config.model.name = Some("gfs".into());
        config.model.versions_dir = dir.path().to_path_buf();
        config
            .exports
            .insert("PARA_CONFIG".into(), "/fake_para_config".into());

        let bindings = resolve(&Environment::default(), &config, "prod");
        assert_eq!(bindings.get("gfs_ver"), Some("v15.0.0"));
        assert_eq!(bindings.get("prod_util_ver"), Some("v1.0.5"));
        assert_eq!(
            bindings.get("HOMEgfs"),
            Some(
                "/gpfs/hps3/emc/global/noscrub/emc.glopara/ecflow/fv3/git/fv3gfs_flat/gfs.v15.0.0"
            )
        );
        assert_eq!(bindings.get("PARA_CONFIG"), Some("/fake_para_config"));
    }

    #[test]
    fn model_without_version_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gdas.ver"), "export other_ver=v1\n").unwrap();

        let mut config = SiteConfig::default();
        config.model.versions_dir = dir.path().to_path_buf();
        let env = Environment::from_pairs([("model", "gdas")]);

        let err = Resolver::new(&config, &env).resolve("para").unwrap_err();
        assert!(matches!(err, JobError::MissingModelVersion(ref m) if m == "gdas"));
    }

    #[test]
    fn eval_model_version_needs_nwroot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gfs.ver"), "export gfs_ver=v15.0.0\n").unwrap();

        let mut config = SiteConfig::default();
        config.model.name = Some("gfs".into());
        config.model.versions_dir = dir.path().to_path_buf();

        let err = Resolver::new(&config, &Environment::default())
            .resolve("eval")
            .unwrap_err();
        assert!(matches!(err, JobError::Config(_)));

        let env = Environment::from_pairs([("NWROOT", "/nw")]);
        let bindings = resolve(&env, &config, "eval");
        assert_eq!(bindings.get("HOMEgfs"), Some("/nw/gfs.v15.0.0"));
    }
}
