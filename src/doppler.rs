use serde::{Deserialize, Serialize};

/*
Doppler states of a target.

The Doppler state determines which pixels of the history array count as "on"
when searching for the target, according to the following table.

x means don't care. TARGET is the above-threshold bit, APPROACHING and
RECEDING are the Doppler bits, BACKUP is the sticky bit that survives pixel
clearing.

                 TARGET  APPROACHING  RECEDING
Any                  1        x           x
NoDoppler            1        0           0
Approaching          1        1           0
Receding             1        0           1
AnyDoppler           1        1           0    or
                     1        0           1
NotReceding          1        x           0
NotApproaching       1        0           x

Any is the typical non-Doppler target. AnyDoppler is only used when scanning
for new targets and converts to Approaching or Receding on the first refresh.
NotReceding and NotApproaching only occur while checking contour lengths for
the Approaching/Receding -> Any transition. AnyPlus matches the sticky bit
and is never transitioned away from.
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Doppler {
    /// Any echo above threshold
    #[default]
    Any,
    /// An echo without either Doppler bit
    NoDoppler,
    Approaching,
    Receding,
    /// Approaching or Receding
    AnyDoppler,
    /// NoDoppler or Approaching
    NotReceding,
    /// NoDoppler or Receding
    NotApproaching,
    /// Also matches pixels that have been cleared
    AnyPlus,
}

// Fraction of the blob that must carry one Doppler bit before the target is
// classified as moving that way, and the fraction below which the
// classification is dropped again.
const TO_DOPPLER_FRACTION: f64 = 0.85;
const FROM_DOPPLER_FRACTION: f64 = 0.80;

impl Doppler {
    /// Whether a pixel with the given bits counts as "on" in this state.
    pub fn matches_pixel(
        &self,
        target: bool,
        backup: bool,
        approaching: bool,
        receding: bool,
    ) -> bool {
        match self {
            Doppler::Any => target,
            Doppler::NoDoppler => target && !approaching && !receding,
            Doppler::Approaching => approaching,
            Doppler::Receding => receding,
            Doppler::AnyDoppler => approaching || receding,
            Doppler::NotReceding => target && !receding,
            Doppler::NotApproaching => target && !approaching,
            Doppler::AnyPlus => backup,
        }
    }

    /// The state after a confirmed fix, decided on the pixel counts taken
    /// over the target's blob.
    pub fn transition(&self, total_pix: u32, approaching_pix: u32, receding_pix: u32) -> Doppler {
        let check_to_doppler = (total_pix as f64 * TO_DOPPLER_FRACTION) as u32;
        let check_not_approaching =
            ((total_pix - approaching_pix) as f64 * FROM_DOPPLER_FRACTION) as u32;
        let check_not_receding = ((total_pix - receding_pix) as f64 * FROM_DOPPLER_FRACTION) as u32;

        match self {
            Doppler::AnyDoppler | Doppler::Any => {
                if approaching_pix > receding_pix && approaching_pix > check_to_doppler {
                    Doppler::Approaching
                } else if receding_pix > approaching_pix && receding_pix > check_to_doppler {
                    Doppler::Receding
                } else if *self == Doppler::AnyDoppler {
                    Doppler::Any
                } else {
                    *self
                }
            }

            Doppler::Receding => {
                if receding_pix < check_not_approaching {
                    Doppler::Any
                } else {
                    *self
                }
            }

            Doppler::Approaching => {
                if approaching_pix < check_not_receding {
                    Doppler::Any
                } else {
                    *self
                }
            }

            _ => *self,
        }
    }
}
