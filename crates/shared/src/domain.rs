use serde::{Deserialize, Serialize};

/// Seats per pod: a 3x3 grid with the center cell reserved.
pub const POD_CAPACITY: usize = 8;
pub const POD_GRID_SIDE: usize = 3;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(StudentId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub students: Vec<Student>,
}

impl Pod {
    pub fn is_full(&self) -> bool {
        self.students.len() >= POD_CAPACITY
    }

    /// Lays the pod's students out on its display grid, row-major. The center
    /// cell is always `None`; seat `k` lands on cell `k`, or `k + 1` once past
    /// the center.
    pub fn seat_grid(&self) -> [[Option<&Student>; POD_GRID_SIDE]; POD_GRID_SIDE] {
        let center = POD_GRID_SIDE * POD_GRID_SIDE / 2;
        let mut grid = [[None; POD_GRID_SIDE]; POD_GRID_SIDE];
        for (seat, student) in self.students.iter().take(POD_CAPACITY).enumerate() {
            let cell = if seat < center { seat } else { seat + 1 };
            grid[cell / POD_GRID_SIDE][cell % POD_GRID_SIDE] = Some(student);
        }
        grid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub pods: Vec<Pod>,
}

impl Row {
    pub fn with_empty_pod() -> Self {
        Self {
            pods: vec![Pod::default()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPeriod {
    pub number: u32,
    pub rows: Vec<Row>,
    pub unassigned_students: Vec<Student>,
}

impl ClassPeriod {
    /// A fresh period: one row holding one empty pod, nobody enrolled.
    pub fn new(number: u32) -> Self {
        Self {
            number,
            rows: vec![Row::with_empty_pod()],
            unassigned_students: Vec::new(),
        }
    }

    pub fn pod(&self, row: usize, pod: usize) -> Option<&Pod> {
        self.rows.get(row)?.pods.get(pod)
    }

    pub fn pod_mut(&mut self, row: usize, pod: usize) -> Option<&mut Pod> {
        self.rows.get_mut(row)?.pods.get_mut(pod)
    }

    /// Every student in the period, seated ones first in row/pod order.
    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.rows
            .iter()
            .flat_map(|row| row.pods.iter())
            .flat_map(|pod| pod.students.iter())
            .chain(self.unassigned_students.iter())
    }
}
