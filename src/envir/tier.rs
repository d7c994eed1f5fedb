use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Deployment tier a job runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Prod,
    Para,
    Test,
    Eval,
    Emcpara,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::Prod, Tier::Para, Tier::Test, Tier::Eval, Tier::Emcpara];

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Prod => "prod",
            Tier::Para => "para",
            Tier::Test => "test",
            Tier::Eval => "eval",
            Tier::Emcpara => "emcpara",
        }
    }

    /// The single table entry for this tier.
    pub fn profile(&self) -> &'static TierProfile {
        match self {
            Tier::Prod => &PROD,
            Tier::Para => &PARA,
            Tier::Test => &TEST,
            Tier::Eval => &EVAL,
            Tier::Emcpara => &EMCPARA,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|tier| tier.name() == s)
            .ok_or_else(|| JobError::UnknownTier(s.to_string()))
    }
}

/// Path and flag policy for one tier.
#[derive(Debug)]
pub struct TierProfile {
    pub tier: Tier,
    pub layout: Layout,
}

impl TierProfile {
    /// Value exported as `$envir`; `eval` jobs run as `para`.
    pub fn effective_envir(&self) -> &'static str {
        match &self.layout {
            Layout::Experiment(_) => self.tier.name(),
            Layout::Operational(op) => op.envir,
        }
    }
}

#[derive(Debug)]
pub enum Layout {
    /// Paths rooted at `/gpfs/<fs>/ptmp/emc.glopara/<EMCPEN>`.
    Experiment(ExperimentLayout),
    /// Operational roots taken from the site (COMROOT, UTILROOT).
    Operational(OperationalLayout),
}

#[derive(Debug)]
pub struct ExperimentLayout {
    pub emcpen_default: &'static str,
    /// Exported as `CRAY_F_SET`.
    pub fs_set: &'static str,
    pub nwroot: &'static str,
    pub nwprod: Option<&'static str>,
    /// Appended to the experiment root to form `PCOMROOT`.
    pub pcom_suffix: &'static str,
    /// Exports `COMOUT_ROOT` and the `GESROOT` family.
    pub publishes_gesroot: bool,
    pub keepdata: bool,
}

#[derive(Debug)]
pub struct OperationalLayout {
    pub envir: &'static str,
    pub dataroot: &'static str,
    /// `DBNROOT` leaf when `SENDDBN=YES`.
    pub live_dbn: &'static str,
}

/// `DBNROOT` leaf used whenever downstream alerts are disabled.
pub const FAKE_DBN: &str = "fakedbn";

const NWROOT_FLAT: &str = "/gpfs/hps3/emc/global/noscrub/emc.glopara/ecflow/fv3/git/fv3gfs_flat";
const NWROOT_Q3FY17: &str = "/gpfs/hps3/emc/global/noscrub/emc.glopara/svn/gfs/q3fy17_final";
const NWPROD_OPS: &str = "/gpfs/hps/nco/ops/nwprod";

static PROD: TierProfile = TierProfile {
    tier: Tier::Prod,
    layout: Layout::Experiment(ExperimentLayout {
        emcpen_default: "ecfgfsfv3",
        fs_set: "hps2",
        nwroot: NWROOT_FLAT,
        nwprod: Some(NWPROD_OPS),
        pcom_suffix: "pcom/prod",
        publishes_gesroot: true,
        keepdata: false,
    }),
};

static PARA: TierProfile = TierProfile {
    tier: Tier::Para,
    layout: Layout::Experiment(ExperimentLayout {
        emcpen_default: "ecfgfs2017",
        fs_set: "hps2",
        nwroot: NWROOT_Q3FY17,
        nwprod: None,
        pcom_suffix: "pcom/prod",
        publishes_gesroot: true,
        keepdata: true,
    }),
};

static TEST: TierProfile = TierProfile {
    tier: Tier::Test,
    layout: Layout::Experiment(ExperimentLayout {
        emcpen_default: "ecfgfs2017",
        fs_set: "hps2",
        nwroot: NWROOT_Q3FY17,
        nwprod: None,
        pcom_suffix: "pcom/prod",
        publishes_gesroot: true,
        keepdata: true,
    }),
};

static EMCPARA: TierProfile = TierProfile {
    tier: Tier::Emcpara,
    layout: Layout::Experiment(ExperimentLayout {
        emcpen_default: "ecfgfs2017",
        fs_set: "hps2",
        nwroot: NWROOT_Q3FY17,
        nwprod: None,
        pcom_suffix: "pcom",
        publishes_gesroot: false,
        keepdata: true,
    }),
};

static EVAL: TierProfile = TierProfile {
    tier: Tier::Eval,
    layout: Layout::Operational(OperationalLayout {
        envir: "para",
        dataroot: "/gpfs/hps2/nco/ops/tmpnwprd",
        live_dbn: "para_dbn",
    }),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_tiers() {
        for tier in Tier::ALL {
            assert_eq!(tier.name().parse::<Tier>().unwrap(), tier);
            assert_eq!(tier.to_string(), tier.name());
        }
    }

    #[test]
    fn parse_is_exact() {
        assert!(matches!("PROD".parse::<Tier>(), Err(JobError::UnknownTier(_))));
        assert!(matches!(" prod".parse::<Tier>(), Err(JobError::UnknownTier(_))));
        assert!(matches!("".parse::<Tier>(), Err(JobError::UnknownTier(_))));
    }

    #[test]
    fn every_profile_belongs_to_its_tier() {
        for tier in Tier::ALL {
            assert_eq!(tier.profile().tier, tier);
        }
    }

    #[test]
    fn eval_runs_as_para() {
        assert_eq!(Tier::Eval.profile().effective_envir(), "para");
        assert_eq!(Tier::Emcpara.profile().effective_envir(), "emcpara");
    }

    #[test]
    fn prod_differs_from_para_in_keepdata_and_nwroot() {
        let (Layout::Experiment(prod), Layout::Experiment(para)) =
            (&Tier::Prod.profile().layout, &Tier::Para.profile().layout)
        else {
            panic!("prod and para use the experiment layout");
        };
        assert!(!prod.keepdata);
        assert!(para.keepdata);
        assert_ne!(prod.nwroot, para.nwroot);
        assert_eq!(prod.pcom_suffix, para.pcom_suffix);
    }
}
