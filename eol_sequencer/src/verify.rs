//! MCU temperature verification.
//!
//! Up to 11 attempts (initial + 10 retries at 1 s intervals); success the
//! moment `|actual − expected| <= tolerance`, boundary inclusive. Simulator
//! backends skip the loop entirely after a short settle.

use crate::emergency::EmergencyStop;
use eol_common::cancel::CancelToken;
use eol_common::error::{EolError, EolResult};
use eol_hal::capability::Mcu;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Initial attempt plus ten retries.
const VERIFY_ATTEMPTS: u32 = 11;
/// Pause between attempts.
const RETRY_INTERVAL: Duration = Duration::from_secs(1);
/// Settle applied instead of the loop for simulator backends.
const SIMULATOR_SETTLE: Duration = Duration::from_millis(100);

/// Verify that the MCU has converged to `expected` °C.
pub async fn verify_mcu_temperature(
    mcu: &mut dyn Mcu,
    expected: f64,
    tolerance: f64,
    cancel: &CancelToken,
    emergency: &EmergencyStop,
) -> EolResult<()> {
    if mcu.is_simulator() {
        debug!("mcu: simulator backend, skipping temperature verification");
        sleep(SIMULATOR_SETTLE).await;
        return Ok(());
    }

    let mut last_actual = f64::NAN;
    for attempt in 1..=VERIFY_ATTEMPTS {
        if emergency.is_active() {
            return Err(EolError::Safety("emergency stop active".to_string()));
        }
        cancel.check()?;

        let actual = mcu.get_temperature().await?;
        let difference = (actual - expected).abs();
        if difference <= tolerance {
            info!(
                "mcu: temperature verified at {actual:.1} °C \
                 (expected {expected:.1} °C, attempt {attempt})"
            );
            return Ok(());
        }

        last_actual = actual;
        warn!(
            "mcu: temperature {actual:.1} °C off target {expected:.1} °C \
             (difference {difference:.1} > tolerance {tolerance:.1}, \
             attempt {attempt}/{VERIFY_ATTEMPTS})"
        );
        if attempt < VERIFY_ATTEMPTS {
            sleep(RETRY_INTERVAL).await;
        }
    }

    Err(EolError::operation(
        "mcu",
        "verify_temperature",
        format!(
            "expected {expected:.1} °C, got {last_actual:.1} °C \
             (difference {:.1} exceeds tolerance {tolerance:.1} \
             after {VERIFY_ATTEMPTS} attempts)",
            (last_actual - expected).abs()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eol_hal::sim::SimMcu;

    async fn connected(mcu: SimMcu) -> SimMcu {
        let mut mcu = mcu;
        mcu.connect().await.expect("connect");
        mcu
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_backend_bypasses_verification() {
        let mut mcu = connected(SimMcu::new().with_fixed_temperature(20.0)).await;
        // Way off target, but the simulator flag short-circuits.
        verify_mcu_temperature(
            &mut mcu,
            66.0,
            3.0,
            &CancelToken::new(),
            &EmergencyStop::new(),
        )
        .await
        .expect("bypassed");
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_tolerance_exhausts_attempts() {
        let mut mcu =
            connected(SimMcu::new().with_fixed_temperature(20.0).with_hardware_identity()).await;

        let result = verify_mcu_temperature(
            &mut mcu,
            38.0,
            3.0,
            &CancelToken::new(),
            &EmergencyStop::new(),
        )
        .await;

        match result {
            Err(EolError::Operation {
                device: "mcu",
                operation: "verify_temperature",
                reason,
            }) => {
                assert!(reason.contains("38.0"));
                assert!(reason.contains("20.0"));
            }
            other => panic!("expected verification failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_difference_passes() {
        // |35.0 − 38.0| == tolerance exactly.
        let mut mcu =
            connected(SimMcu::new().with_fixed_temperature(35.0).with_hardware_identity()).await;

        verify_mcu_temperature(
            &mut mcu,
            38.0,
            3.0,
            &CancelToken::new(),
            &EmergencyStop::new(),
        )
        .await
        .expect("boundary passes");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_verification() {
        let mut mcu =
            connected(SimMcu::new().with_fixed_temperature(20.0).with_hardware_identity()).await;

        let cancel = CancelToken::new();
        cancel.cancel();

        let result =
            verify_mcu_temperature(&mut mcu, 38.0, 3.0, &cancel, &EmergencyStop::new()).await;
        assert!(matches!(result, Err(EolError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn convergent_hardware_identity_passes_within_retries() {
        // Real verification loop against the converging thermal model.
        // From 25.0 °C ambient toward 30.0 °C the 10 %-per-read model lands
        // inside a 3.0 °C tolerance well within 11 reads.
        let mut mcu = connected(SimMcu::new().with_hardware_identity()).await;
        mcu.set_operating_temperature(30.0).await.expect("target");

        verify_mcu_temperature(
            &mut mcu,
            30.0,
            3.0,
            &CancelToken::new(),
            &EmergencyStop::new(),
        )
        .await
        .expect("converges within 11 attempts");
    }
}
