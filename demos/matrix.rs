use std::mem;

use rnalloc::{Chunk, Result, TreeAllocator};
use tracing_subscriber::EnvFilter;

/// A rows x cols matrix whose row table and rows all hang off the header
/// chunk, so releasing the header releases the whole matrix.
struct Matrix {
  rows: usize,
  cols: usize,
  data: *mut *mut i32,
}

unsafe fn matrix_new(
  tree: &mut TreeAllocator,
  rows: usize,
  cols: usize,
) -> Result<Chunk> {
  unsafe {
    let header = tree.allocate_zeroed(mem::size_of::<Matrix>(), None)?;

    match matrix_fill(tree, header, rows, cols) {
      Ok(()) => Ok(header),
      Err(err) => {
        // Takes the row table and any rows allocated so far with it.
        tree.release(Some(header));
        Err(err)
      }
    }
  }
}

unsafe fn matrix_fill(
  tree: &mut TreeAllocator,
  header: Chunk,
  rows: usize,
  cols: usize,
) -> Result<()> {
  unsafe {
    let table = tree.allocate_zeroed(rows * mem::size_of::<*mut i32>(), Some(header))?;

    let m = header.cast::<Matrix>();
    m.write(Matrix {
      rows,
      cols,
      data: table.cast(),
    });

    for i in 0..rows {
      let row = tree.allocate(cols * mem::size_of::<i32>(), Some(table))?;
      *(*m).data.add(i) = row.cast();
    }

    Ok(())
  }
}

unsafe fn print_matrix(header: Chunk) {
  unsafe {
    let m = &*header.cast::<Matrix>();

    for i in 0..m.rows {
      let row = *m.data.add(i);
      let cells: Vec<String> = (0..m.cols).map(|j| format!("{:3}", *row.add(j))).collect();
      println!("  [{}]", cells.join(" "));
    }
  }
}

fn main() -> Result<()> {
  // RUST_LOG=rnalloc=trace shows every tree operation.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut tree = TreeAllocator::new();

  unsafe {
    // --------------------------------------------------------------------
    // 1) Build a 4x5 matrix: header -> row table -> rows.
    // --------------------------------------------------------------------
    let matrix = matrix_new(&mut tree, 4, 5)?;
    let table = tree.first_child(matrix);
    println!("\n[1] Matrix header = {:?}, row table = {:?}", matrix, table);

    let m = &*matrix.cast::<Matrix>();
    for i in 0..m.rows {
      let row = *m.data.add(i);
      for j in 0..m.cols {
        *row.add(j) = (i * m.cols + j) as i32;
      }
    }
    print_matrix(matrix);

    // --------------------------------------------------------------------
    // 2) Every row depends on the row table.
    // --------------------------------------------------------------------
    let rows: Vec<Chunk> = table.map(|table| tree.children(table).collect()).unwrap_or_default();
    println!("\n[2] Row table has {} rows", rows.len());
    for row in &rows {
      println!("  row {:?} -> parent {:?}", row, tree.parent(Some(*row)));
    }

    // --------------------------------------------------------------------
    // 3) Grow the header. It may move; its row table follows it.
    // --------------------------------------------------------------------
    let matrix = tree.resize(Some(matrix), 64 * 1024)?;
    println!("\n[3] Resized header = {:?}", matrix);
    println!("  row table parent = {:?}", tree.parent(tree.first_child(matrix)));
    print_matrix(matrix);

    // --------------------------------------------------------------------
    // 4) Steal the rows: cut the row table and give its rows to a new owner.
    // --------------------------------------------------------------------
    let owner = tree.allocate(0, None)?;
    let table = tree.first_child(matrix);
    tree.cut(table, Some(owner))?;
    println!("\n[4] Rows now owned by {:?}", owner);
    println!("  owner has {} children", tree.children(owner).count());

    // --------------------------------------------------------------------
    // 5) Release everything. `cut` left the row table as a bare root, so
    //    it is released on its own; the rows go with `owner`.
    // --------------------------------------------------------------------
    println!("\n[5] Matrix has {} children left", tree.children(matrix).count());
    let matrix = tree.release(Some(matrix));
    let table = tree.release(table);
    let owner = tree.release(Some(owner));
    println!(
      "  Released: matrix = {:?}, table = {:?}, owner = {:?}",
      matrix, table, owner
    );
  }

  Ok(())
}
