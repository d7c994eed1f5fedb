use std::fmt;

use crate::envir::Environment;
use crate::error::JobError;

/// Who this job is, as far as the ecFlow server is concerned.
#[derive(Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub pass: String,
    pub try_no: u32,
    pub run_id: String,
}

impl JobIdentity {
    /// Read the identity the scheduler exported for this job.
    ///
    /// The run id falls back to the LSF job id and then to `pid`.
    pub fn from_env(env: &Environment, pid: u32) -> Result<Self, JobError> {
        let name = require(env, "ECF_NAME")?;
        let host = env
            .get("ECF_NODE")
            .or_else(|| env.get("ECF_LOGHOST"))
            .or_else(|| env.get("ECF_HOST"))
            .ok_or(JobError::MissingIdentity("ECF_NODE"))?
            .to_string();
        let port = parse("ECF_PORT", &require(env, "ECF_PORT")?)?;
        let pass = require(env, "ECF_PASS")?;
        let try_no = match env.get("ECF_TRYNO") {
            Some(raw) => parse("ECF_TRYNO", raw)?,
            None => 1,
        };
        let run_id = env
            .get("ECF_RID")
            .or_else(|| env.get("LSB_JOBID"))
            .map(str::to_string)
            .unwrap_or_else(|| pid.to_string());

        Ok(Self {
            name,
            host,
            port,
            pass,
            try_no,
            run_id,
        })
    }

    /// Variables the client and the job body need to reach the server.
    pub fn exports(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ECF_NAME", self.name.clone()),
            ("ECF_HOST", self.host.clone()),
            ("ECF_NODE", self.host.clone()),
            ("ECF_PORT", self.port.to_string()),
            ("ECF_PASS", self.pass.clone()),
            ("ECF_TRYNO", self.try_no.to_string()),
            ("ECF_RID", self.run_id.clone()),
        ]
    }

    /// `KEY=VALUE` lines for the LSF drop file.
    pub fn drop_lines(&self) -> String {
        format!(
            "ECF_NAME={}\nECF_NODE={}\nECF_PORT={}\nECF_PASS={}\nECF_TRYNO={}\nECF_RID={}\n",
            self.name, self.host, self.port, self.pass, self.try_no, self.run_id
        )
    }
}

// Keep the job password out of logs.
impl fmt::Debug for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobIdentity")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("try_no", &self.try_no)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

fn require(env: &Environment, name: &'static str) -> Result<String, JobError> {
    env.get(name)
        .map(str::to_string)
        .ok_or(JobError::MissingIdentity(name))
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, JobError> {
    raw.trim().parse().map_err(|_| JobError::InvalidIdentity {
        name,
        value: raw.to_string(),
    })
}
