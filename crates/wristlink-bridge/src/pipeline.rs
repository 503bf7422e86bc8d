use wristlink_device::{relay, DeviceChannel, WeatherMessage};
use wristlink_weather::{acquire, LocationProvider, PositionOptions, WeatherProvider};

use crate::error::RunError;

/// Everything a pipeline run needs; shared read-only between runs.
pub struct PipelineContext<L, C> {
    pub location: L,
    pub weather: WeatherProvider,
    pub channel: C,
    pub options: PositionOptions,
}

/// One run: position fix, weather lookup, relay to the watch.
///
/// The first failure ends the run. Nothing reaches the watch unless both
/// message fields were produced.
pub async fn run_pipeline<L, C>(ctx: &PipelineContext<L, C>) -> Result<WeatherMessage, RunError>
where
    L: LocationProvider,
    C: DeviceChannel,
{
    let position = match acquire(&ctx.location, ctx.options).await {
        Ok(position) => position,
        Err(e) => {
            tracing::error!("Error requesting location! {}", e);
            return Err(e.into());
        }
    };

    let observation = match ctx.weather.fetch(&position.coords).await {
        Ok(observation) => observation,
        Err(e) => {
            tracing::error!("Error fetching weather: {}", e);
            return Err(e.into());
        }
    };

    let message = WeatherMessage::new(observation.temperature_c, observation.location_name);
    relay(&ctx.channel, message.clone()).await?;

    Ok(message)
}
