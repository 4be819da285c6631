//! Pixel-computation script shared by every statistics request

/// Returns NDVI from B04/B08, masking cloudy pixels via the scene
/// classification (CLM) and combining with the data mask.
pub const NDVI_EVALSCRIPT: &str = r#"
// returns NDVI masking cloud pixels

function setup() {
  return {
    input: [
      {
        bands: ["B04", "B08", "CLM", "CLP", "dataMask"]
      }
    ],
    output: [
      {
        id: "ndvi",
        bands: 1
      },
      {
        id: "masks",
        bands: ["CLM"],
        sampleType: "UINT16"
      },
      {
        id: "dataMask",
        bands: 1
      }
    ]
  }
}

function evaluatePixel(samples) {
    // cloud probability normalized to interval [0, 1]
    let CLP = samples.CLP / 255.0;
    // masking cloudy pixels
    let combinedMask = samples.dataMask
    if (samples.CLM > 0) {
        combinedMask = 0;
    }
    return {
      ndvi: [index(samples.B08, samples.B04)],
      masks: [samples.CLM],
      dataMask: [combinedMask]
    };
}
"#;
