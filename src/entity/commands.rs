//! Controller command dispatch.
//!
//! Commands only issue protocol operations. The resulting state changes come
//! back through the attribute listeners like any other report.

use super::adapter::EntityAdapter;
use super::converters;
use super::model::{EntityKind, StatusCode};
use crate::error::Result;
use crate::matter::clusters::{ClusterClient, ClusterCommand, ClusterKind, OnOffAttribute};
use log::{debug, error, warn};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Command parameters as sent by the controller.
pub type CommandParams = Map<String, Value>;

const BRIGHTNESS: &str = "brightness";
const COLOR_TEMPERATURE: &str = "color_temperature";
const HUE: &str = "hue";
const SATURATION: &str = "saturation";
const POSITION: &str = "position";
const TILT_POSITION: &str = "tilt_position";

/// Tilt target of a `tilt_up` command, fully open.
const TILT_UP_100THS: u16 = 10_000;

fn number(params: Option<&CommandParams>, key: &str) -> Option<f64> {
    params?.get(key)?.as_f64()
}

/// Outcome of one dispatch step before it is mapped to a status code.
enum Dispatch {
    Done,
    MissingCluster(ClusterKind),
    UnknownCommand,
}

impl EntityAdapter {
    /// Translate a controller command into protocol operations.
    pub async fn dispatch_command(
        &self,
        command_id: &str,
        params: Option<&CommandParams>,
    ) -> StatusCode {
        debug!(
            "[Entity] Got {} command request: {} params: {:?}",
            self.entity_id(),
            command_id,
            params
        );

        if !self.is_connected() {
            warn!(
                "[Entity] Node of {} is not connected, rejecting {}",
                self.entity_id(),
                command_id
            );
            return StatusCode::ServiceUnavailable;
        }

        let result = match self.kind() {
            EntityKind::Switch => self.switch_command(command_id).await,
            EntityKind::Light => self.light_command(command_id, params).await,
            EntityKind::Cover => self.cover_command(command_id, params).await,
            EntityKind::Sensor => Ok(Dispatch::UnknownCommand),
        };

        match result {
            Ok(Dispatch::Done) => StatusCode::Ok,
            Ok(Dispatch::MissingCluster(cluster)) => {
                warn!(
                    "[Entity] {} has no {:?} cluster for {}",
                    self.entity_id(),
                    cluster,
                    command_id
                );
                StatusCode::NotFound
            }
            Ok(Dispatch::UnknownCommand) => StatusCode::NotImplemented,
            Err(e) => {
                error!(
                    "[Entity] Command {} on {} failed: {}",
                    command_id,
                    self.entity_id(),
                    e
                );
                StatusCode::ServiceUnavailable
            }
        }
    }

    fn client(&self, cluster: ClusterKind) -> Option<Arc<dyn ClusterClient>> {
        self.endpoint().cluster_client(cluster)
    }

    async fn invoke(&self, cluster: ClusterKind, command: ClusterCommand) -> Result<Dispatch> {
        let Some(client) = self.client(cluster) else {
            return Ok(Dispatch::MissingCluster(cluster));
        };
        client.invoke(command).await?;
        Ok(Dispatch::Done)
    }

    async fn switch_command(&self, command_id: &str) -> Result<Dispatch> {
        let command = match command_id {
            "toggle" => ClusterCommand::Toggle,
            "on" => ClusterCommand::On,
            "off" => ClusterCommand::Off,
            _ => return Ok(Dispatch::UnknownCommand),
        };
        self.invoke(ClusterKind::OnOff, command).await
    }

    async fn light_command(
        &self,
        command_id: &str,
        params: Option<&CommandParams>,
    ) -> Result<Dispatch> {
        match command_id {
            "toggle" => self.invoke(ClusterKind::OnOff, ClusterCommand::Toggle).await,
            "off" => self.invoke(ClusterKind::OnOff, ClusterCommand::Off).await,
            "on" => self.light_on(params).await,
            _ => Ok(Dispatch::UnknownCommand),
        }
    }

    async fn light_on(&self, params: Option<&CommandParams>) -> Result<Dispatch> {
        let transition_time = self.settings().light_transition_time;
        let on_off = self.client(ClusterKind::OnOff);
        let brightness = number(params, BRIGHTNESS);

        if let Some(on_off) = &on_off {
            if brightness == Some(0.0) {
                on_off.invoke(ClusterCommand::Off).await?;
                return Ok(Dispatch::Done);
            }
            let is_off = on_off
                .cached_attribute(OnOffAttribute::OnOff as u32)
                .as_bool()
                == Some(false);
            if brightness.is_some() && is_off {
                on_off.invoke(ClusterCommand::On).await?;
            }
        }

        if let (Some(level), Some(brightness)) = (self.client(ClusterKind::LevelControl), brightness) {
            level
                .invoke(ClusterCommand::MoveToLevel {
                    level: converters::canonical_to_level(brightness),
                    transition_time,
                })
                .await?;
            return Ok(Dispatch::Done);
        }

        let color = self.client(ClusterKind::ColorControl);
        if let (Some(color), Some(percent)) = (&color, number(params, COLOR_TEMPERATURE)) {
            color
                .invoke(ClusterCommand::MoveToColorTemperature {
                    mireds: converters::percent_to_mireds(percent),
                    transition_time,
                })
                .await?;
            return Ok(Dispatch::Done);
        }
        if let (Some(color), Some(hue), Some(saturation)) =
            (&color, number(params, HUE), number(params, SATURATION))
        {
            color
                .invoke(ClusterCommand::MoveToHueAndSaturation {
                    hue: converters::degrees_to_hue(hue),
                    saturation: converters::canonical_to_level(saturation),
                    transition_time,
                })
                .await?;
            return Ok(Dispatch::Done);
        }

        let Some(on_off) = on_off else {
            return Ok(Dispatch::MissingCluster(ClusterKind::OnOff));
        };
        on_off.invoke(ClusterCommand::On).await?;
        Ok(Dispatch::Done)
    }

    async fn cover_command(
        &self,
        command_id: &str,
        params: Option<&CommandParams>,
    ) -> Result<Dispatch> {
        let inverted = self.settings().cover_percent_inverted;
        let command = match command_id {
            "open" => ClusterCommand::UpOrOpen,
            "close" => ClusterCommand::DownOrClose,
            "stop" | "tilt_stop" => ClusterCommand::StopMotion,
            "position" => {
                let Some(position) = number(params, POSITION) else {
                    warn!("[Entity] position command without position on {}", self.entity_id());
                    return Ok(Dispatch::Done);
                };
                ClusterCommand::GoToLiftPercentage {
                    percent_100ths: converters::percent_to_position(position, inverted),
                }
            }
            "tilt" => {
                let tilt = number(params, TILT_POSITION).or_else(|| number(params, POSITION));
                let Some(tilt) = tilt else {
                    warn!("[Entity] tilt command without position on {}", self.entity_id());
                    return Ok(Dispatch::Done);
                };
                ClusterCommand::GoToTiltPercentage {
                    percent_100ths: converters::percent_to_position(tilt, false),
                }
            }
            "tilt_up" => ClusterCommand::GoToTiltPercentage {
                percent_100ths: TILT_UP_100THS,
            },
            "tilt_down" => ClusterCommand::GoToTiltPercentage { percent_100ths: 0 },
            _ => return Ok(Dispatch::UnknownCommand),
        };
        self.invoke(ClusterKind::WindowCovering, command).await
    }
}
