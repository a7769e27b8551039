use crate::engine::{Board, BOARD_SIZE};
use std::time::{SystemTime, UNIX_EPOCH};

/// Parses an array of string slices into a `Board` object.
///
/// Each string slice represents a row, starting from row 0. Cells are separated
/// by whitespace; `.` or `0` marks an empty cell, anything else must be a tile
/// value. Missing rows and missing trailing cells are left empty.
///
/// # Arguments
/// * `s`: A slice of string slices (`&[&str]`) representing the rows of the board.
///
/// # Returns
/// * `Ok(Board)` if parsing is successful.
/// * `Err(String)` if:
///     - The number of rows in `s` exceeds `BOARD_SIZE`.
///     - A row has more than `BOARD_SIZE` cells.
///     - A cell is neither `.` nor a power of two (2, 4, 8, ...).
///
/// # Examples
/// ```
/// use twenty48::utils::board_from_str_array;
///
/// let board = board_from_str_array(&["2 . 4", ". 8"]).unwrap();
/// assert_eq!(board.get_tile(0, 0), 2);
/// assert_eq!(board.get_tile(0, 2), 4);
/// assert_eq!(board.get_tile(0, 3), 0); // Rest of row 0 is empty
/// assert_eq!(board.get_tile(1, 1), 8);
/// assert_eq!(board.get_tile(3, 3), 0); // Missing rows are empty
///
/// assert!(board_from_str_array(&["2 x"]).is_err());
/// assert!(board_from_str_array(&["3"]).is_err());
/// ```
pub fn board_from_str_array(s: &[&str]) -> Result<Board, String> {
    if s.len() > BOARD_SIZE {
        return Err(format!(
            "Invalid number of rows. Expected at most {}, found {}",
            BOARD_SIZE,
            s.len()
        ));
    }

    let mut grid = [[0; BOARD_SIZE]; BOARD_SIZE];

    for (r, row_str) in s.iter().enumerate() {
        let cells: Vec<&str> = row_str.split_whitespace().collect();
        if cells.len() > BOARD_SIZE {
            return Err(format!(
                "Row {} is too long. Expected at most {} cells, found {}",
                r,
                BOARD_SIZE,
                cells.len()
            ));
        }

        for (c, cell) in cells.iter().enumerate() {
            grid[r][c] = match *cell {
                "." | "0" => 0,
                token => match token.parse::<u32>() {
                    Ok(value) if value >= 2 && value.is_power_of_two() => value,
                    _ => {
                        return Err(format!(
                            "Unrecognized tile '{}' in row {} col {}",
                            token, r, c
                        ))
                    }
                },
            };
        }
    }
    Ok(Board::from_grid(grid))
}

/// Today's date (UTC) as `DD.MM.YYYY`, the format leaderboard entries carry.
pub fn today_string() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format_date((secs / 86_400) as i64)
}

/// Formats a count of days since 1970-01-01 as `DD.MM.YYYY`.
pub fn format_date(days_since_epoch: i64) -> String {
    let (year, month, day) = civil_from_days(days_since_epoch);
    format!("{:02}.{:02}.{:04}", day, month, year)
}

// Proleptic Gregorian conversion, after Howard Hinnant's `civil_from_days`.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
