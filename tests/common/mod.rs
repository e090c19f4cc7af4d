use rust_xlsxwriter::Workbook;

/// Writes one worksheet per entry; `None` cells stay blank.
pub fn workbook_bytes(sheets: &[(&str, Vec<Vec<Option<serde_json::Value>>>)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match cell {
                    Some(serde_json::Value::String(s)) => {
                        worksheet.write_string(r, c, s.as_str()).unwrap();
                    }
                    Some(serde_json::Value::Number(n)) => {
                        worksheet.write_number(r, c, n.as_f64().unwrap()).unwrap();
                    }
                    Some(serde_json::Value::Bool(b)) => {
                        worksheet.write_boolean(r, c, *b).unwrap();
                    }
                    _ => {}
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}
