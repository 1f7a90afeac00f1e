//! Default stream bitrate selection

use crate::media::Codec;

/// Bitrate ladder keyed by the average side length of the output
///
/// The key is `sqrt(width * height) / 1.2`; the first threshold it does not
/// exceed selects the rate, and anything above the last threshold uses the
/// last rate.
#[derive(Debug, Clone, PartialEq)]
pub struct BitrateLadder {
    pub thresholds: [f32; 5],
    pub h265: [u32; 6],
    pub h264: [u32; 6],
    pub mjpeg: [u32; 6],
}

impl Default for BitrateLadder {
    fn default() -> Self {
        Self {
            thresholds: [240.0, 320.0, 480.0, 640.0, 960.0],
            h265: [100, 200, 400, 800, 1600, 3200],
            h264: [200, 400, 800, 1600, 3200, 6400],
            mjpeg: [800, 1600, 3200, 6400, 12800, 25600],
        }
    }
}

impl BitrateLadder {
    /// Rate in kbps for a `width` x `height` output
    pub fn kbps(&self, codec: Codec, width: u32, height: u32) -> u32 {
        let rates = match codec {
            Codec::H265 => &self.h265,
            Codec::H264 => &self.h264,
            Codec::Mjpeg | Codec::None => &self.mjpeg,
        };
        let ave_sq = ((width as f32) * (height as f32)).sqrt() / 1.2;
        let step = self
            .thresholds
            .iter()
            .position(|t| ave_sq <= *t)
            .unwrap_or(self.thresholds.len());
        rates[step]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_buckets() {
        let ladder = BitrateLadder::default();
        // 288 / 1.2 = 240 sits exactly on the first threshold
        assert_eq!(ladder.kbps(Codec::H264, 288, 288), 200);
        // 512 / 1.2 = 426.7
        assert_eq!(ladder.kbps(Codec::H264, 512, 512), 800);
        assert_eq!(ladder.kbps(Codec::H265, 512, 512), 400);
        assert_eq!(ladder.kbps(Codec::Mjpeg, 512, 512), 3200);
        assert_eq!(ladder.kbps(Codec::H264, 1024, 1024), 3200);
        assert_eq!(ladder.kbps(Codec::H264, 2048, 1024), 6400);
        assert_eq!(ladder.kbps(Codec::H265, 2048, 1024), 3200);
    }

    #[test]
    fn test_custom_ladder() {
        let ladder = BitrateLadder {
            h264: [1, 2, 3, 4, 5, 6],
            ..Default::default()
        };
        assert_eq!(ladder.kbps(Codec::H264, 100, 100), 1);
    }
}
