use rust_xlsxwriter::{Format, Workbook};

#[derive(Debug, Clone, Copy)]
pub enum Fixture {
    Text(&'static str),
    Num(f64),
    Bool(bool),
    /// Serial day number written with a date format.
    Date(f64),
    Blank,
}

/// Builds an in-memory xlsx file with one worksheet per entry.
pub fn xlsx_fixture(sheets: &[(&str, Vec<Vec<Fixture>>)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match cell {
                    Fixture::Text(s) => {
                        worksheet.write_string(r, c, *s).unwrap();
                    }
                    Fixture::Num(n) => {
                        worksheet.write_number(r, c, *n).unwrap();
                    }
                    Fixture::Bool(b) => {
                        worksheet.write_boolean(r, c, *b).unwrap();
                    }
                    Fixture::Date(serial) => {
                        worksheet
                            .write_number_with_format(r, c, *serial, &date_format)
                            .unwrap();
                    }
                    Fixture::Blank => {}
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}
