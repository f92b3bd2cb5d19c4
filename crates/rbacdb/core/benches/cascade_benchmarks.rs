// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Cascade benchmarks
//!
//! Measures how the cost of an action rename grows with the number of
//! permissions, roles and users that depend on the action.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rbacdb_core::{Action, Database, DatabaseInterface, Permission, Role, User, observing_action_store, observing_permission_store, observing_role_store, observing_user_store};
use std::sync::Arc;
use std::time::Duration;

fn populated_db(fan_out: usize) -> Arc<dyn DatabaseInterface> {
    let db: Arc<dyn DatabaseInterface> = Arc::new(Database::new_in_memory("bench"));
    let actions = observing_action_store(db.clone());
    let permissions = observing_permission_store(db.clone());
    let roles = observing_role_store(db.clone());
    let users = observing_user_store(db.clone());

    let shared = Action::new("read", "Read pages");
    actions.create(&shared);

    for i in 0..fan_out {
        let own = Action::new(format!("own_{i}"), "Private action");
        actions.create(&own);
        let permission = Permission::new(format!("perm_{i}"), vec![own, shared.clone()]);
        permissions.create(&permission);
        let role = Role::new(format!("role_{i}"), vec![permission]);
        roles.create(&role);
        users.create(&User::with_id(format!("user_{i}"), format!("id-{i}"), vec![role]));
    }

    db
}

fn bench_action_rename(c: &mut Criterion) {
    let mut group = c.benchmark_group("action_rename_cascade");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    for fan_out in [1usize, 10, 50] {
        let actions = observing_action_store(populated_db(fan_out));
        group.throughput(Throughput::Elements(fan_out as u64));
        group.bench_with_input(BenchmarkId::new("fan_out", fan_out), &fan_out, |b, _| {
            b.iter(|| {
                // Rename and rename back so every iteration starts from the same graph
                black_box(actions.update("read", Action::new("browse", "Read pages")));
                black_box(actions.update("browse", Action::new("read", "Read pages")));
            });
        });
    }

    group.finish();
}

fn bench_read_user(c: &mut Criterion) {
    let users = observing_user_store(populated_db(10));

    c.bench_function("read_nested_user", |b| {
        b.iter(|| black_box(users.read(black_box("user_5"))));
    });
}

criterion_group!(benches, bench_action_rename, bench_read_user);
criterion_main!(benches);
