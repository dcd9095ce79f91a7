use super::matrix::ModuleMatrix;
use super::types::RendererError;

/// Parse 2D raw notation: comma-separated rows of `0`/`1`, all the same length.
pub(super) fn parse(data: &str) -> Result<ModuleMatrix, RendererError> {
    let rows: Vec<&str> = data.split(',').map(str::trim).collect();
    let width = rows.first().map_or(0, |row| row.len());
    if width == 0 {
        return Err(RendererError::invalid_matrix("rows must not be empty"));
    }

    let mut cells = Vec::with_capacity(width * rows.len());
    for (index, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(RendererError::invalid_matrix(format!(
                "row {} has {} modules, expected {width}",
                index + 1,
                row.len()
            )));
        }
        for module in row.chars() {
            match module {
                '1' => cells.push(true),
                '0' => cells.push(false),
                other => {
                    return Err(RendererError::invalid_matrix(format!(
                        "unexpected module `{other}` in row {}",
                        index + 1
                    )));
                }
            }
        }
    }

    Ok(ModuleMatrix::new(width, rows.len(), cells))
}
