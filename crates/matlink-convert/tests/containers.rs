//! Text, cell and struct conversions, including nested containers and
//! arrays the converter declines.

use matlink_convert::{to_foreign, to_host};
use matlink_mx::{ComplexLayout, HeapMx, MxAlloc, MxClassId, MxQuery};
use matlink_value::ndarray::{ArrayD, IxDyn};
use matlink_value::{StructArray, StructValue, Value};

fn layouts() -> [HeapMx; 2] {
    [
        HeapMx::new(ComplexLayout::Split),
        HeapMx::new(ComplexLayout::Interleaved),
    ]
}

fn customer() -> StructValue {
    StructValue::new()
        .with("name", "John Doe")
        .with("billing", 127.0)
        .with(
            "test",
            Value::matrix(&[2, 3], vec![1., 4., 2., 5., 3., 6.]).unwrap(),
        )
}

#[test]
fn text_round_trips() {
    for mx in layouts() {
        for text in ["hello", "h\u{eb}llo", ""] {
            let handle = to_foreign(&mx, &Value::from(text)).unwrap();
            assert_eq!(mx.class_id(handle).unwrap(), MxClassId::Char);
            assert_eq!(to_host(&mx, handle).unwrap(), Value::from(text));
            mx.destroy(handle);
        }
    }
}

#[test]
fn raw_bytes_are_written_one_character_per_byte() {
    let mx = HeapMx::default();
    let handle = to_foreign(&mx, &Value::Bytes(vec![b'h', 0xff])).unwrap();
    assert_eq!(mx.dimensions(handle).unwrap(), vec![1, 2]);
    assert_eq!(to_host(&mx, handle).unwrap(), Value::from("h\u{ff}"));
    mx.destroy(handle);

    let handle = to_foreign(&mx, &Value::Bytes(vec![0xe9, 0x00, b'a'])).unwrap();
    assert_eq!(mx.dimensions(handle).unwrap(), vec![1, 3]);
    assert_eq!(to_host(&mx, handle).unwrap(), Value::from("\u{e9}\0a"));
    mx.destroy(handle);
}

#[test]
fn scalar_struct_keeps_fields_and_order() {
    for mx in layouts() {
        let record = customer();
        let handle = to_foreign(&mx, &Value::from(record.clone())).unwrap();
        assert_eq!(mx.class_id(handle).unwrap(), MxClassId::Struct);
        assert_eq!(mx.dimensions(handle).unwrap(), vec![1, 1]);
        assert_eq!(mx.field_count(handle).unwrap(), 3);
        assert_eq!(mx.field_name(handle, 2).unwrap(), "test");

        let back = to_host(&mx, handle).unwrap();
        let read = back.as_struct().unwrap();
        let names: Vec<_> = read.field_names().collect();
        assert_eq!(names, ["name", "billing", "test"]);
        assert_eq!(read.get("name"), Some(&Value::from("John Doe")));
        assert_eq!(read.get("billing"), Some(&Value::from(127.0)));
        assert_eq!(read.get("test").and_then(Value::dims), Some(vec![2, 3]));
        assert_eq!(read, &record);
        mx.destroy(handle);
        assert_eq!(mx.live_count(), 0);
    }
}

#[test]
fn struct_array_elements_are_column_major() {
    for mx in layouts() {
        let records = vec![
            StructValue::new().with("name", "John Doe").with("age", 41u8),
            StructValue::new().with("name", "Ann Lane").with("age", 37u8),
        ];
        let people = StructArray::from_records(&[1, 2], records).unwrap();
        let handle = to_foreign(&mx, &Value::from(people.clone())).unwrap();
        assert_eq!(mx.dimensions(handle).unwrap(), vec![1, 2]);
        let second = mx.field(handle, 1, 0).unwrap().unwrap();
        assert_eq!(mx.decode_text(second).unwrap(), b"Ann Lane");

        let back = to_host(&mx, handle).unwrap();
        let Value::StructArray(read) = &back else {
            panic!("expected struct array, got {back:?}");
        };
        assert_eq!(read.shape(), &[1, 2]);
        assert_eq!(read.get(&[0, 0], "name"), Some(&Value::from("John Doe")));
        assert_eq!(read.get(&[0, 1], "name"), Some(&Value::from("Ann Lane")));
        assert_eq!(read, &people);
        mx.destroy(handle);
    }
}

#[test]
fn two_dimensional_struct_array_order() {
    let mx = HeapMx::default();
    let records: Vec<StructValue> = (0..6)
        .map(|k| StructValue::new().with("k", k as f64))
        .collect();
    let grid = StructArray::from_records(&[2, 3], records).unwrap();
    let handle = to_foreign(&mx, &Value::from(grid.clone())).unwrap();
    // element (1, 2) sits at linear index 1 + 2 * 2
    let fifth = mx.field(handle, 5, 0).unwrap().unwrap();
    assert_eq!(to_host(&mx, fifth).unwrap(), Value::from(5.0));
    assert_eq!(to_host(&mx, handle).unwrap(), Value::from(grid));
    mx.destroy(handle);
}

#[test]
fn mixed_cell_round_trips() {
    for mx in layouts() {
        let inner = Value::cell_row(vec![Value::from(vec![1i8, 2, 3]), Value::from("deep")]);
        let cell = Value::cell_row(vec![
            Value::from(1.0),
            Value::from("two"),
            Value::Bool(true),
            inner,
            Value::from(customer()),
        ]);
        let handle = to_foreign(&mx, &cell).unwrap();
        assert_eq!(mx.class_id(handle).unwrap(), MxClassId::Cell);
        assert_eq!(mx.dimensions(handle).unwrap(), vec![1, 5]);

        let back = to_host(&mx, handle).unwrap();
        let Value::Cell(read) = &back else {
            panic!("expected cell, got {back:?}");
        };
        assert_eq!(read[[0, 1]], Value::from("two"));
        assert_eq!(read[[0, 2]], Value::Bool(true));
        // the nested int8 vector comes back as a 1x3 row
        let Value::Cell(nested) = &read[[0, 3]] else {
            panic!("expected nested cell");
        };
        assert_eq!(nested[[0, 0]].dims(), Some(vec![1, 3]));
        assert_eq!(nested[[0, 1]], Value::from("deep"));
        assert_eq!(read[[0, 4]], Value::from(customer()));
        mx.destroy(handle);
        assert_eq!(mx.live_count(), 0);
    }
}

#[test]
fn cell_matrix_uses_column_major_slots() {
    let mx = HeapMx::default();
    let items: Vec<Value> = (0..6).map(|k| Value::from(k as f64)).collect();
    // row-major host layout: [[0, 1, 2], [3, 4, 5]]
    let cells = ArrayD::from_shape_vec(IxDyn(&[2, 3]), items).unwrap();
    let handle = to_foreign(&mx, &Value::from(cells.clone())).unwrap();
    let slot = mx.cell(handle, 1).unwrap().unwrap();
    assert_eq!(to_host(&mx, slot).unwrap(), Value::from(3.0));
    assert_eq!(to_host(&mx, handle).unwrap(), Value::Cell(cells));
    mx.destroy(handle);
}

#[test]
fn unset_slots_read_as_empty() {
    let mx = HeapMx::default();
    let cell = mx.create_cell(&[1, 3]).unwrap();
    let middle = mx.create_string(b"x").unwrap();
    mx.set_cell(cell, 1, middle).unwrap();
    let Value::Cell(read) = to_host(&mx, cell).unwrap() else {
        panic!("expected cell");
    };
    assert!(read[[0, 0]].is_empty_sentinel());
    assert_eq!(read[[0, 1]], Value::from("x"));
    assert!(read[[0, 2]].is_empty_sentinel());

    let st = mx.create_struct(&[1, 1], &["set", "unset"]).unwrap();
    let value = mx.create_string(b"v").unwrap();
    mx.set_field(st, 0, "set", value).unwrap();
    let back = to_host(&mx, st).unwrap();
    let read = back.as_struct().unwrap();
    assert_eq!(read.get("set"), Some(&Value::from("v")));
    assert!(read.get("unset").unwrap().is_empty_sentinel());

    mx.destroy(cell);
    mx.destroy(st);
}

#[test]
fn empty_containers() {
    let mx = HeapMx::default();
    let handle = to_foreign(&mx, &Value::from(StructValue::new())).unwrap();
    assert_eq!(to_host(&mx, handle).unwrap(), Value::from(StructValue::new()));
    mx.destroy(handle);

    let none = Value::cell(&[0, 0], Vec::new()).unwrap();
    let handle = to_foreign(&mx, &none).unwrap();
    assert_eq!(to_host(&mx, handle).unwrap(), none);
    mx.destroy(handle);

    let nobody = StructArray::new(&[0, 1], ["name"]);
    let handle = to_foreign(&mx, &Value::from(nobody.clone())).unwrap();
    assert_eq!(to_host(&mx, handle).unwrap(), Value::from(nobody));
    mx.destroy(handle);
}

#[test]
fn unmapped_classes_are_declined() {
    let mx = HeapMx::default();
    for class in [MxClassId::Function, MxClassId::Other(18)] {
        let opaque = mx.create_opaque(class, &[1, 1]).unwrap();
        assert_eq!(to_host(&mx, opaque).unwrap(), Value::Foreign(opaque));
        assert!(mx.is_live(opaque));
        mx.destroy(opaque);
    }
}

#[test]
fn foreign_values_pass_through() {
    let mx = HeapMx::default();
    let opaque = mx.create_opaque(MxClassId::Function, &[1, 1]).unwrap();
    assert_eq!(to_foreign(&mx, &Value::Foreign(opaque)).unwrap(), opaque);
    assert_eq!(mx.live_count(), 1);
    mx.destroy(opaque);
}

#[test]
fn nested_declined_arrays_are_copied_on_write() {
    let mx = HeapMx::default();
    let cell = mx.create_cell(&[1, 2]).unwrap();
    let callback = mx.create_opaque(MxClassId::Function, &[1, 1]).unwrap();
    mx.set_cell(cell, 0, callback).unwrap();

    let read = to_host(&mx, cell).unwrap();
    let Value::Cell(items) = &read else {
        panic!("expected cell");
    };
    assert_eq!(items[[0, 0]], Value::Foreign(callback));
    assert!(items[[0, 1]].is_empty_sentinel());

    let copy = to_foreign(&mx, &read).unwrap();
    let copied = mx.cell(copy, 0).unwrap().unwrap();
    assert_ne!(copied, callback);
    assert_eq!(mx.class_id(copied).unwrap(), MxClassId::Function);

    mx.destroy(cell);
    assert!(mx.is_live(copied));
    mx.destroy(copy);
    assert_eq!(mx.live_count(), 0);
}
