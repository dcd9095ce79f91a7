use qrcode::{Color, QrCode};

use crate::domain::symbology::EcLevel;

use super::matrix::ModuleMatrix;
use super::types::RendererError;

impl From<EcLevel> for qrcode::EcLevel {
    fn from(level: EcLevel) -> Self {
        match level {
            EcLevel::L => qrcode::EcLevel::L,
            EcLevel::M => qrcode::EcLevel::M,
            EcLevel::Q => qrcode::EcLevel::Q,
            EcLevel::H => qrcode::EcLevel::H,
        }
    }
}

pub(super) fn encode(data: &str, level: EcLevel) -> Result<ModuleMatrix, RendererError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), level.into())
        .map_err(|err| RendererError::Encoding(err.to_string()))?;
    let width = code.width();
    let cells = code
        .to_colors()
        .into_iter()
        .map(|color| color == Color::Dark)
        .collect();
    Ok(ModuleMatrix::new(width, width, cells))
}
