//! Two-step setup: credentials first, then one or more panels. The step
//! machine is pure apart from the credential check; `run_interactive` drives
//! it from a terminal.

use crate::config::{Config, ConfigError, DEFAULT_PANEL_NAME, InimConfig, PanelConfig};
use crate::inim_api::inim_client::{InimApiError, InimApiTrait, InimClient};
use crate::inim_api::models::active_scenarios::ScenarioCode;
use crate::scenario::{ArmMode, ScenarioTable};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::{info, warn};

pub const ERROR_AUTH: &str = "auth";
pub const ERROR_INVALID_PANEL: &str = "invalid_panel";
pub const ERROR_ALREADY_CONFIGURED: &str = "already_configured";
pub const ENTRY_TITLE: &str = "Inim Alarm";

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("step {0:?} is not valid before the credentials step succeeded")]
    OutOfOrder(FlowStepId),

    #[error("setup aborted: {0}")]
    Aborted(String),

    #[error("failed to read setup input: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStepId {
    User,
    Panel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsInput {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub device_id: String,
}

/// Panel form. `None` leaves a mode without a scenario; the defaults are the
/// factory numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelInput {
    pub name: String,
    pub armed_away: Option<ScenarioCode>,
    pub disarmed: Option<ScenarioCode>,
    pub armed_night: Option<ScenarioCode>,
    pub armed_home: Option<ScenarioCode>,
    pub armed_vacation: Option<ScenarioCode>,
    pub add_another: bool,
}

impl Default for PanelInput {
    fn default() -> Self {
        let defaults = ScenarioTable::inim_defaults();
        Self {
            name: String::new(),
            armed_away: defaults.armed_away,
            disarmed: defaults.disarmed,
            armed_night: defaults.armed_night,
            armed_home: defaults.armed_home,
            armed_vacation: defaults.armed_vacation,
            add_another: false,
        }
    }
}

impl PanelInput {
    fn scenario_table(&self) -> ScenarioTable {
        ScenarioTable {
            armed_away: self.armed_away,
            disarmed: self.disarmed,
            armed_night: self.armed_night,
            armed_home: self.armed_home,
            armed_vacation: self.armed_vacation,
        }
    }
}

/// The finished setup, ready to be merged into a `Config`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub title: String,
    pub credentials: CredentialsInput,
    pub panels: Vec<PanelConfig>,
}

impl ConfigEntry {
    /// Replaces the INIM credentials and panels of `base`, keeping its
    /// logging, broker and interval settings.
    pub fn into_config(self, mut base: Config) -> Result<Config, ConfigError> {
        base.inim = InimConfig {
            username: self.credentials.username,
            password: self.credentials.password,
            client_id: self.credentials.client_id,
            device_id: self.credentials.device_id,
            ..base.inim
        };
        base.panels = self.panels;
        base.validate()?;
        Ok(base)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    ShowForm {
        step: FlowStepId,
        errors: BTreeMap<String, String>,
    },
    Abort {
        reason: String,
    },
    CreateEntry(ConfigEntry),
}

impl FlowStep {
    fn form(step: FlowStepId) -> Self {
        FlowStep::ShowForm {
            step,
            errors: BTreeMap::new(),
        }
    }

    fn form_error(step: FlowStepId, error: &str) -> Self {
        FlowStep::ShowForm {
            step,
            errors: BTreeMap::from([("base".to_string(), error.to_string())]),
        }
    }
}

/// Checks that a set of credentials can log in to the cloud.
pub trait Authenticator {
    fn validate(
        &self,
        credentials: &CredentialsInput,
    ) -> impl Future<Output = Result<(), InimApiError>> + Send;
}

/// Validates by registering a throwaway client against the real cloud.
pub struct InimAuthenticator {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Authenticator for InimAuthenticator {
    async fn validate(&self, credentials: &CredentialsInput) -> Result<(), InimApiError> {
        let client = InimClient::new(
            &self.base_url,
            &credentials.username,
            &credentials.password,
            &credentials.client_id,
            self.request_timeout,
        )?;
        client.token().await.map(|_| ())
    }
}

#[derive(Debug, Default)]
pub struct ConfigFlow {
    /// Title of an entry that already exists, if any.
    existing_title: Option<String>,
    credentials: Option<CredentialsInput>,
    panels: Vec<PanelConfig>,
}

impl ConfigFlow {
    pub fn new(existing: Option<&Config>) -> Self {
        Self {
            existing_title: existing.map(|config| entry_title(&config.inim.username)),
            ..Default::default()
        }
    }

    pub async fn step_user<A: Authenticator>(
        &mut self,
        input: CredentialsInput,
        auth: &A,
    ) -> FlowStep {
        if let Err(e) = auth.validate(&input).await {
            warn!("Authentication for {} failed: {:?}", input.username, e);
            return FlowStep::form_error(FlowStepId::User, ERROR_AUTH);
        }

        if self.existing_title.as_deref() == Some(entry_title(&input.username).as_str()) {
            return FlowStep::Abort {
                reason: ERROR_ALREADY_CONFIGURED.to_string(),
            };
        }

        info!("Authenticated {} for device {}", input.username, input.device_id);
        self.credentials = Some(input);
        self.panels.clear();
        FlowStep::form(FlowStepId::Panel)
    }

    pub fn step_panel(&mut self, input: PanelInput) -> Result<FlowStep, FlowError> {
        let Some(credentials) = &self.credentials else {
            return Err(FlowError::OutOfOrder(FlowStepId::Panel));
        };

        let name = match input.name.trim() {
            "" => DEFAULT_PANEL_NAME,
            name => name,
        };
        let panel = PanelConfig::new(name, input.scenario_table());

        if let Err(e) = panel.scenarios.validate() {
            warn!("Rejected panel {}: {}", name, e);
            return Ok(FlowStep::form_error(FlowStepId::Panel, ERROR_INVALID_PANEL));
        }
        if self.panels.iter().any(|p| p.unique_id == panel.unique_id) {
            return Ok(FlowStep::form_error(
                FlowStepId::Panel,
                ERROR_ALREADY_CONFIGURED,
            ));
        }

        info!("Added panel {} ({})", panel.name, panel.unique_id);
        self.panels.push(panel);
        if input.add_another {
            return Ok(FlowStep::form(FlowStepId::Panel));
        }

        Ok(FlowStep::CreateEntry(ConfigEntry {
            title: ENTRY_TITLE.to_string(),
            credentials: credentials.clone(),
            panels: std::mem::take(&mut self.panels),
        }))
    }
}

fn entry_title(username: &str) -> String {
    format!("{} - {}", ENTRY_TITLE, username)
}

fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: Option<&str>,
) -> Result<String, FlowError> {
    match default {
        Some(default) => write!(output, "{} [{}]: ", label, default)?,
        None => write!(output, "{}: ", label)?,
    }
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(FlowError::Aborted("input closed".to_string()));
    }
    let value = line.trim();
    Ok(match (value, default) {
        ("", Some(default)) => default.to_string(),
        _ => value.to_string(),
    })
}

fn prompt_code<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    mode: ArmMode,
) -> Result<Option<ScenarioCode>, FlowError> {
    let default = ScenarioTable::inim_defaults()
        .code_for(mode)
        .map(|code| code.to_string());
    loop {
        let hint = default.as_deref().unwrap_or("none");
        let value = prompt(input, output, &format!("Scenario for {}", mode), Some(hint))?;
        if value == "none" {
            return Ok(None);
        }
        match value.parse::<ScenarioCode>() {
            Ok(code) => return Ok(Some(code)),
            Err(_) => writeln!(output, "Enter a scenario number or \"none\"")?,
        }
    }
}

fn describe_errors(errors: &BTreeMap<String, String>) -> &'static str {
    match errors.get("base").map(String::as_str) {
        Some(ERROR_AUTH) => "Authentication failed, check the credentials",
        Some(ERROR_INVALID_PANEL) => {
            "Invalid scenarios: away and disarmed are required and codes must be distinct"
        }
        Some(ERROR_ALREADY_CONFIGURED) => "A panel with that name already exists",
        _ => "Invalid input",
    }
}

/// Runs the flow against a terminal until an entry is created. Closing the
/// input aborts.
pub async fn run_interactive<A, R, W>(
    flow: &mut ConfigFlow,
    auth: &A,
    mut input: R,
    mut output: W,
) -> Result<ConfigEntry, FlowError>
where
    A: Authenticator,
    R: BufRead,
    W: Write,
{
    writeln!(output, "INIM cloud credentials")?;
    loop {
        let credentials = CredentialsInput {
            username: prompt(&mut input, &mut output, "Username", None)?,
            password: prompt(&mut input, &mut output, "Password", None)?,
            client_id: prompt(&mut input, &mut output, "Client id", None)?,
            device_id: prompt(&mut input, &mut output, "Device id", None)?,
        };
        match flow.step_user(credentials, auth).await {
            FlowStep::ShowForm {
                step: FlowStepId::Panel,
                ..
            } => break,
            FlowStep::ShowForm { errors, .. } => writeln!(output, "{}", describe_errors(&errors))?,
            FlowStep::Abort { reason } => return Err(FlowError::Aborted(reason)),
            FlowStep::CreateEntry(entry) => return Ok(entry),
        }
    }

    writeln!(output, "Alarm panel")?;
    loop {
        let panel = PanelInput {
            name: prompt(&mut input, &mut output, "Panel name", Some(DEFAULT_PANEL_NAME))?,
            armed_away: prompt_code(&mut input, &mut output, ArmMode::ArmedAway)?,
            disarmed: prompt_code(&mut input, &mut output, ArmMode::Disarmed)?,
            armed_night: prompt_code(&mut input, &mut output, ArmMode::ArmedNight)?,
            armed_home: prompt_code(&mut input, &mut output, ArmMode::ArmedHome)?,
            armed_vacation: prompt_code(&mut input, &mut output, ArmMode::ArmedVacation)?,
            add_another: prompt(&mut input, &mut output, "Add another panel? (y/n)", Some("n"))?
                .eq_ignore_ascii_case("y"),
        };
        match flow.step_panel(panel)? {
            FlowStep::CreateEntry(entry) => return Ok(entry),
            FlowStep::ShowForm { errors, .. } if !errors.is_empty() => {
                writeln!(output, "{}", describe_errors(&errors))?
            }
            FlowStep::ShowForm { .. } => writeln!(output, "Next panel")?,
            FlowStep::Abort { reason } => return Err(FlowError::Aborted(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inim_api::test_support::FakeInimApi;
    use std::io::Cursor;

    impl Authenticator for FakeInimApi {
        async fn validate(&self, _credentials: &CredentialsInput) -> Result<(), InimApiError> {
            self.token().await.map(|_| ())
        }
    }

    fn credentials() -> CredentialsInput {
        CredentialsInput {
            username: "me@example.com".to_string(),
            password: "secret".to_string(),
            client_id: "abc".to_string(),
            device_id: "42".to_string(),
        }
    }

    fn base_error(step: &FlowStep) -> Option<&str> {
        match step {
            FlowStep::ShowForm { errors, .. } => errors.get("base").map(String::as_str),
            _ => None,
        }
    }

    async fn authenticated_flow() -> ConfigFlow {
        let mut flow = ConfigFlow::new(None);
        let step = flow.step_user(credentials(), &FakeInimApi::default()).await;
        assert_eq!(step, FlowStep::form(FlowStepId::Panel));
        flow
    }

    #[tokio::test]
    async fn auth_failure_shows_user_form_again() {
        let auth = FakeInimApi::default();
        auth.fail_auth(true);
        let mut flow = ConfigFlow::new(None);

        let step = flow.step_user(credentials(), &auth).await;

        assert!(matches!(step, FlowStep::ShowForm { step: FlowStepId::User, .. }));
        assert_eq!(base_error(&step), Some(ERROR_AUTH));
        assert!(matches!(
            flow.step_panel(PanelInput::default()),
            Err(FlowError::OutOfOrder(FlowStepId::Panel))
        ));
    }

    #[tokio::test]
    async fn blank_name_and_defaults_create_entry() {
        let mut flow = authenticated_flow().await;

        let step = flow.step_panel(PanelInput::default()).unwrap();

        let FlowStep::CreateEntry(entry) = step else {
            panic!("expected an entry, got {:?}", step);
        };
        assert_eq!(entry.title, ENTRY_TITLE);
        assert_eq!(entry.credentials, credentials());
        assert_eq!(entry.panels.len(), 1);
        let panel = &entry.panels[0];
        assert_eq!(panel.name, "Inim Alarm Panel");
        assert_eq!(panel.unique_id, "alarm_control_panel_inim_alarm_panel");
        assert_eq!(panel.scenarios, ScenarioTable::inim_defaults());
    }

    #[tokio::test]
    async fn add_another_loops_on_panel_step() {
        let mut flow = authenticated_flow().await;

        let step = flow
            .step_panel(PanelInput {
                name: "Casa".to_string(),
                add_another: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(step, FlowStep::form(FlowStepId::Panel));

        let step = flow
            .step_panel(PanelInput {
                name: "Garage".to_string(),
                armed_home: Some(5),
                ..Default::default()
            })
            .unwrap();
        let FlowStep::CreateEntry(entry) = step else {
            panic!("expected an entry, got {:?}", step);
        };
        let names: Vec<&str> = entry.panels.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Casa", "Garage"]);
        assert_eq!(entry.panels[1].scenarios.armed_home, Some(5));
    }

    #[tokio::test]
    async fn colliding_codes_are_an_invalid_panel() {
        let mut flow = authenticated_flow().await;

        let step = flow
            .step_panel(PanelInput {
                name: "Casa".to_string(),
                armed_vacation: Some(0),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(base_error(&step), Some(ERROR_INVALID_PANEL));
    }

    #[tokio::test]
    async fn duplicate_panel_name_is_rejected() {
        let mut flow = authenticated_flow().await;
        let casa = PanelInput {
            name: "Casa".to_string(),
            add_another: true,
            ..Default::default()
        };

        flow.step_panel(casa.clone()).unwrap();
        let step = flow.step_panel(casa).unwrap();

        assert_eq!(base_error(&step), Some(ERROR_ALREADY_CONFIGURED));
    }

    #[tokio::test]
    async fn existing_account_aborts() {
        let mut existing = Config::example();
        existing.inim.username = "me@example.com".to_string();
        let mut flow = ConfigFlow::new(Some(&existing));

        let step = flow.step_user(credentials(), &FakeInimApi::default()).await;

        assert_eq!(
            step,
            FlowStep::Abort {
                reason: ERROR_ALREADY_CONFIGURED.to_string()
            }
        );
    }

    #[tokio::test]
    async fn entry_merges_into_config() {
        let mut flow = authenticated_flow().await;
        let FlowStep::CreateEntry(entry) = flow.step_panel(PanelInput::default()).unwrap() else {
            panic!("expected an entry");
        };

        let config = entry.into_config(Config::example()).unwrap();

        assert_eq!(config.inim.device_id, "42");
        assert_eq!(config.inim.base_url, Config::example().inim.base_url);
        assert_eq!(config.panels.len(), 1);
    }

    #[tokio::test]
    async fn interactive_retries_auth_then_collects_panels() {
        let auth = FakeInimApi::default();
        auth.fail_auth(true);
        // The fake keeps rejecting, so closing the input ends the flow
        let input = Cursor::new("me\npw\ncid\n42\n");
        let mut output = Vec::new();
        let mut flow = ConfigFlow::new(None);

        let err = run_interactive(&mut flow, &auth, input, &mut output)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Aborted(_)));
        assert!(String::from_utf8(output).unwrap().contains("Authentication failed"));

        auth.fail_auth(false);
        let input = Cursor::new(
            "me\npw\ncid\n42\n\
             Casa\n\n\n\nx\n4\n\ny\n\
             Garage\n0\n1\nnone\nnone\n\n\n",
        );
        let entry = run_interactive(&mut flow, &auth, input, Vec::new())
            .await
            .unwrap();

        assert_eq!(entry.panels.len(), 2);
        assert_eq!(entry.panels[0].scenarios.armed_home, Some(4));
        assert_eq!(entry.panels[1].name, "Garage");
        assert_eq!(entry.panels[1].scenarios.armed_night, None);
        assert_eq!(entry.panels[1].scenarios.armed_home, None);
    }
}
